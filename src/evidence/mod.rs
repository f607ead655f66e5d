/// Evidence records: the analysis output that gets hashed and anchored.
///
/// Lifecycle:
/// 1. `EvidenceDraft` is produced by the analysis stage (no digest yet)
/// 2. `EvidenceDraft::seal` computes the digest and yields an `EvidenceRecord`
/// 3. `EvidenceRecord::with_anchoring` attaches the on-chain outcome
///
/// The digest covers every persisted field except `txid` and `verified`,
/// with the digest field itself taking part as the empty string. Attaching
/// an anchoring outcome therefore never changes the digest.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::Chain;
use crate::crypto::canonical::{self, finite, finite_opt};
use crate::crypto::hash;
use crate::error::{AnchorError, Result};

/// Schema identifier written into every record.
pub const SCHEMA_VERSION: &str = "uav_traffic_ai_evidence_v1";

/// Scene id used on-chain when the record has none.
pub const UNKNOWN_SCENE: &str = "unknown_scene";

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    #[serde(serialize_with = "finite")]
    pub x1: f64,
    #[serde(serialize_with = "finite")]
    pub y1: f64,
    #[serde(serialize_with = "finite")]
    pub x2: f64,
    #[serde(serialize_with = "finite")]
    pub y2: f64,
}

/// A single detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub cls_name: String,
    #[serde(serialize_with = "finite")]
    pub confidence: f64,
    pub bbox: BBox,
    /// Vehicle typology bucket (tourism/moto/heavy/other).
    pub typology: String,
}

/// Where the image was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub scene_id: Option<String>,
    pub scene_name: Option<String>,
    #[serde(serialize_with = "finite_opt")]
    pub lat: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub lon: Option<f64>,
}

/// Aggregated traffic metrics for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub counts_by_typology: BTreeMap<String, u64>,
    #[serde(default)]
    pub counts_by_class: BTreeMap<String, u64>,
    #[serde(default, serialize_with = "finite")]
    pub density_per_megapixel: f64,
    /// Sum of bbox areas over image area.
    #[serde(default, serialize_with = "finite")]
    pub occupancy_ratio: f64,
}

/// Analysis output that has not been hashed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDraft {
    pub schema_version: String,
    pub created_at_utc: DateTime<Utc>,
    pub model_weights: String,
    pub scene: SceneMeta,
    pub image_width: u32,
    pub image_height: u32,
    pub detections: Vec<Detection>,
    pub metrics: Metrics,
}

impl EvidenceDraft {
    pub fn new(
        created_at_utc: DateTime<Utc>,
        model_weights: impl Into<String>,
        scene: SceneMeta,
        image_width: u32,
        image_height: u32,
        detections: Vec<Detection>,
        metrics: Metrics,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at_utc,
            model_weights: model_weights.into(),
            scene,
            image_width,
            image_height,
            detections,
            metrics,
        }
    }

    /// Compute the digest and freeze the draft into a record for `chain`.
    ///
    /// Fails with `AnchorError::Serialization` if any float is non-finite.
    pub fn seal(self, chain: Chain) -> Result<EvidenceRecord> {
        let digest = compute_digest(&self, chain)?;
        Ok(EvidenceRecord {
            content: self,
            digest,
            chain,
            txid: None,
            verified: None,
        })
    }
}

/// On-chain outcome attached to a sealed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchoring {
    pub txid: String,
    /// `None` until verification ran, then the final outcome.
    pub verified: Option<bool>,
}

/// A sealed evidence record, as persisted.
///
/// Fields are private: the content is immutable once sealed and the only
/// way to change the anchoring fields is [`EvidenceRecord::with_anchoring`],
/// which consumes the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    #[serde(flatten)]
    content: EvidenceDraft,
    #[serde(rename = "sha256")]
    digest: String,
    #[serde(rename = "bsv_chain", default)]
    chain: Chain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verified: Option<bool>,
}

/// The exact shape that gets hashed.
#[derive(Serialize)]
struct DigestInput<'a> {
    #[serde(flatten)]
    content: &'a EvidenceDraft,
    sha256: &'static str,
    bsv_chain: Chain,
}

fn compute_digest(content: &EvidenceDraft, chain: Chain) -> Result<String> {
    let bytes = canonical::to_canonical_bytes(&DigestInput {
        content,
        sha256: "",
        bsv_chain: chain,
    })?;
    Ok(hash::sha256_hex(&bytes))
}

impl EvidenceRecord {
    pub fn content(&self) -> &EvidenceDraft {
        &self.content
    }

    /// Lowercase hex SHA-256 of the canonical record.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn txid(&self) -> Option<&str> {
        self.txid.as_deref()
    }

    pub fn verified(&self) -> Option<bool> {
        self.verified
    }

    /// Scene id for the on-chain payload, `unknown_scene` when absent or empty.
    pub fn scene_id_or_default(&self) -> &str {
        match self.content.scene.scene_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => UNKNOWN_SCENE,
        }
    }

    /// The anchoring outcome, if the record was ever anchored.
    pub fn anchoring(&self) -> Option<Anchoring> {
        self.txid.as_ref().map(|txid| Anchoring {
            txid: txid.clone(),
            verified: self.verified,
        })
    }

    /// Return this record with `anchoring` attached.
    pub fn with_anchoring(self, anchoring: Anchoring) -> Self {
        Self {
            txid: Some(anchoring.txid),
            verified: anchoring.verified,
            ..self
        }
    }

    /// Recompute the digest from the record's current content.
    pub fn recompute_digest(&self) -> Result<String> {
        compute_digest(&self.content, self.chain)
    }

    /// Check that the stored digest matches the content.
    pub fn verify_digest(&self) -> Result<bool> {
        Ok(self.recompute_digest()? == self.digest)
    }

    /// Serialize the record for persistence.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AnchorError::Serialization(e.to_string()))
    }

    /// Load a persisted record. The digest is not re-checked here.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| AnchorError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn sample_draft() -> EvidenceDraft {
    use chrono::TimeZone;

    let mut counts_by_typology = BTreeMap::new();
    counts_by_typology.insert("tourism".to_string(), 2);
    counts_by_typology.insert("heavy".to_string(), 1);
    let mut counts_by_class = BTreeMap::new();
    counts_by_class.insert("car".to_string(), 2);
    counts_by_class.insert("truck".to_string(), 1);

    EvidenceDraft::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        "yolov8s.pt",
        SceneMeta {
            scene_id: Some("7".to_string()),
            scene_name: Some("Rotonda norte".to_string()),
            lat: Some(40.4168),
            lon: Some(-3.7038),
        },
        1920,
        1080,
        vec![
            Detection {
                cls_name: "car".to_string(),
                confidence: 0.91,
                bbox: BBox {
                    x1: 10.0,
                    y1: 20.0,
                    x2: 110.5,
                    y2: 80.25,
                },
                typology: "tourism".to_string(),
            },
            Detection {
                cls_name: "truck".to_string(),
                confidence: 0.67,
                bbox: BBox {
                    x1: 400.0,
                    y1: 300.0,
                    x2: 700.0,
                    y2: 520.0,
                },
                typology: "heavy".to_string(),
            },
        ],
        Metrics {
            counts_by_typology,
            counts_by_class,
            density_per_megapixel: 1.4467,
            occupancy_ratio: 0.0348,
        },
    )
}
