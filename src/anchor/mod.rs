/// Ledger anchoring of evidence digests.
///
/// A digest is anchored as a zero-value data-carrier (OP_RETURN) output
/// next to a dust payment back to the signer. Building, funding and
/// signing the transaction is delegated to a `ChainClient`; this module
/// only decides what goes into the outputs.
///
/// On-chain field layout (`UAVTAIVD_V1`):
///
/// ```text
/// [ tag, scene_id, sha256_hex, created_at (YYYY-MM-DDTHH:MM:SSZ), model ]
/// ```
pub mod client;
pub mod keys;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::hash;
use crate::error::{AnchorError, Result};

pub use client::AnchorClient;
pub use keys::SigningKey;

/// Format/version marker, always the first on-chain field.
pub const PROTOCOL_TAG: &str = "UAVTAIVD_V1";

/// Timestamp layout used on-chain.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Default dust amount for the self-payment output, in satoshis.
pub const DEFAULT_DUST_SATS: u64 = 546;

/// Ledger network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Main,
    #[default]
    Test,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Main => "main",
            Chain::Test => "test",
        }
    }

    /// Lenient parse used for environment configuration: anything that is
    /// not `main` selects the test network.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" => Chain::Main,
            _ => Chain::Test,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "main" => Ok(Chain::Main),
            "test" => Ok(Chain::Test),
            other => Err(AnchorError::Config(format!(
                "Unknown chain '{other}', expected 'main' or 'test'"
            ))),
        }
    }
}

/// The application fields carried by the data-carrier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorPayload {
    pub scene_id: String,
    pub sha256_hex: String,
    pub created_at_utc: DateTime<Utc>,
    pub model: String,
}

impl AnchorPayload {
    /// Ordered on-chain fields, tag first.
    pub fn to_fields(&self) -> Vec<Vec<u8>> {
        vec![
            PROTOCOL_TAG.as_bytes().to_vec(),
            self.scene_id.as_bytes().to_vec(),
            self.sha256_hex.as_bytes().to_vec(),
            self.created_at_utc
                .format(TIMESTAMP_FORMAT)
                .to_string()
                .into_bytes(),
            self.model.as_bytes().to_vec(),
        ]
    }

    /// Parse decoded fields back into a payload.
    ///
    /// The tag is checked before anything else is trusted. Extra trailing
    /// fields are ignored.
    pub fn from_fields(fields: &[Vec<u8>]) -> Result<Self> {
        let tag = field_text(fields, 0)?;
        if tag != PROTOCOL_TAG {
            return Err(AnchorError::InvalidScript(format!(
                "unexpected protocol tag '{tag}'"
            )));
        }

        let sha256_hex = field_text(fields, 2)?;
        if !hash::is_digest_hex(sha256_hex) {
            return Err(AnchorError::InvalidScript(
                "digest field is not 64 lowercase hex characters".into(),
            ));
        }

        let timestamp = field_text(fields, 3)?;
        let created_at_utc = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| AnchorError::InvalidScript(format!("bad timestamp: {e}")))?
            .and_utc();

        Ok(Self {
            scene_id: field_text(fields, 1)?.to_string(),
            sha256_hex: sha256_hex.to_string(),
            created_at_utc,
            model: field_text(fields, 4)?.to_string(),
        })
    }
}

fn field_text(fields: &[Vec<u8>], i: usize) -> Result<&str> {
    let raw = fields.get(i).ok_or_else(|| {
        AnchorError::InvalidScript(format!("expected 5 fields, found {}", fields.len()))
    })?;
    std::str::from_utf8(raw)
        .map_err(|_| AnchorError::InvalidScript(format!("field {i} is not UTF-8")))
}

/// A payment output: destination address and amount in satoshis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutput {
    pub address: String,
    pub satoshis: u64,
}

/// Everything the chain client needs to build one anchor transaction.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub chain: Chain,
    pub signing_key: SigningKey,
    pub payments: Vec<PaymentOutput>,
    /// Raw fields for the data-carrier output, in push order.
    pub data_fields: Vec<Vec<u8>>,
    /// The encoded data-carrier script (`OP_FALSE OP_RETURN ...`).
    pub data_script: Vec<u8>,
}

/// Outcome of handing a transaction to the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Accepted by the network.
    Broadcast { txid: String, raw_response: String },
    /// Built or sent, but refused (insufficient funds, policy, ...).
    Rejected { reason: String },
}

/// Result of a successful anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorResult {
    pub txid: String,
    /// Raw broadcast response, kept for audit.
    pub raw_response: String,
}

/// Wallet capability: build, fund, sign and broadcast.
///
/// Implementations own UTXO selection, fees and signatures. Transport
/// failures are returned as `Err`, refusals as `BroadcastOutcome::Rejected`.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Human-readable name (e.g., "WhatsOnChain", "ARC").
    fn name(&self) -> &str;

    async fn broadcast(&self, request: BroadcastRequest) -> Result<BroadcastOutcome>;
}
