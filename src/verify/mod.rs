/// On-chain verification of anchored digests.
///
/// One verification is one explorer poll: fetch every data-carrier script
/// of the transaction, decode each with the script codec, and look for the
/// expected digest (as hex text) inside any decoded field. Polling under a
/// retry policy is done by the pipeline, not here.
pub mod explorer;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anchor::Chain;
use crate::error::Result;
use crate::script;

pub use explorer::{WhatsOnChain, WhatsOnChainConfig};

/// One data-carrier output as reported by an explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReturnEntry {
    /// Output index.
    #[serde(default)]
    pub n: Option<u32>,
    /// Full locking script, hex-encoded.
    #[serde(default)]
    pub hex: Option<String>,
}

/// Read-only access to a transaction's data-carrier outputs.
///
/// Any failure (transport, non-2xx status, unparseable body) is an
/// `AnchorError::Lookup`.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Human-readable name (e.g., "WhatsOnChain").
    fn name(&self) -> &str;

    async fn op_return_outputs(&self, chain: Chain, txid: &str) -> Result<Vec<OpReturnEntry>>;
}

/// Outcome of one verification poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyResult {
    pub ok: bool,
    /// Every field decoded across all data-carrier outputs, in output order.
    pub found_fields: Vec<Vec<u8>>,
    /// Raw script hex strings that were examined.
    pub script_hexes: Vec<String>,
}

pub struct Verifier {
    explorer: Arc<dyn Explorer>,
}

impl Verifier {
    pub fn new(explorer: Arc<dyn Explorer>) -> Self {
        Self { explorer }
    }

    /// Poll the explorer once for `txid` and look for `expected_digest_hex`.
    pub async fn verify(
        &self,
        chain: Chain,
        txid: &str,
        expected_digest_hex: &str,
    ) -> Result<VerifyResult> {
        let entries = self.explorer.op_return_outputs(chain, txid).await?;
        let result = check_entries(&entries, expected_digest_hex);

        debug!(
            explorer = self.explorer.name(),
            txid = %txid,
            scripts = result.script_hexes.len(),
            fields = result.found_fields.len(),
            ok = result.ok,
            "Verification poll complete"
        );

        Ok(result)
    }
}

/// Decode `entries` and check for the digest.
///
/// Entries without a script are ignored and malformed hex is skipped, so
/// foreign outputs in the same transaction cannot fail the check.
pub fn check_entries(entries: &[OpReturnEntry], expected_digest_hex: &str) -> VerifyResult {
    let script_hexes: Vec<String> = entries.iter().filter_map(|e| e.hex.clone()).collect();

    let mut found_fields = Vec::new();
    for script_hex in &script_hexes {
        match script::decode_hex(script_hex) {
            Ok(fields) => found_fields.extend(fields),
            Err(e) => warn!(error = %e, "Skipping undecodable data-carrier script"),
        }
    }

    let ok = contains_digest(&found_fields, expected_digest_hex);
    VerifyResult {
        ok,
        found_fields,
        script_hexes,
    }
}

/// Whether the digest's UTF-8 bytes occur inside any single field.
///
/// Any field position counts, not just the digest slot of the anchor
/// layout. An empty digest never matches.
pub fn contains_digest(fields: &[Vec<u8>], expected_digest_hex: &str) -> bool {
    let needle = expected_digest_hex.as_bytes();
    if needle.is_empty() {
        return false;
    }
    fields
        .iter()
        .any(|field| field.windows(needle.len()).any(|window| window == needle))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::error::AnchorError;

    /// Explorer that replays scripted responses, one per poll.
    pub(crate) struct FakeExplorer {
        replies: Mutex<VecDeque<Result<Vec<OpReturnEntry>>>>,
        pub(crate) polls: Mutex<Vec<(Chain, String)>>,
    }

    impl FakeExplorer {
        pub(crate) fn new(replies: Vec<Result<Vec<OpReturnEntry>>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                polls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn poll_count(&self) -> usize {
            self.polls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Explorer for FakeExplorer {
        fn name(&self) -> &str {
            "fake"
        }

        async fn op_return_outputs(&self, chain: Chain, txid: &str) -> Result<Vec<OpReturnEntry>> {
            self.polls.lock().unwrap().push((chain, txid.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AnchorError::Lookup("HTTP 404 Not Found".into())))
        }
    }

    pub(crate) fn entry_for(fields: &[Vec<u8>]) -> OpReturnEntry {
        OpReturnEntry {
            n: Some(1),
            hex: Some(script::encode_hex(fields).unwrap()),
        }
    }

    pub(crate) fn anchor_fields(digest: &str) -> Vec<Vec<u8>> {
        vec![
            b"UAVTAIVD_V1".to_vec(),
            b"7".to_vec(),
            digest.as_bytes().to_vec(),
            b"2024-01-01T00:00:00Z".to_vec(),
            b"yolov8s.pt".to_vec(),
        ]
    }

    #[tokio::test]
    async fn test_verify_finds_digest() {
        let digest = "ab".repeat(32);
        let explorer = FakeExplorer::new(vec![Ok(vec![entry_for(&anchor_fields(&digest))])]);
        let verifier = Verifier::new(explorer.clone());

        let result = verifier.verify(Chain::Test, "tx1", &digest).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.found_fields, anchor_fields(&digest));
        assert_eq!(result.script_hexes.len(), 1);
        assert_eq!(
            explorer.polls.lock().unwrap().as_slice(),
            &[(Chain::Test, "tx1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_verify_other_digest_not_ok() {
        let explorer =
            FakeExplorer::new(vec![Ok(vec![entry_for(&anchor_fields(&"cd".repeat(32)))])]);
        let verifier = Verifier::new(explorer);

        let result = verifier
            .verify(Chain::Main, "tx1", &"ab".repeat(32))
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.found_fields.len(), 5);
    }

    #[tokio::test]
    async fn test_verify_propagates_lookup_error() {
        let explorer = FakeExplorer::new(vec![]);
        let verifier = Verifier::new(explorer);
        assert!(matches!(
            verifier.verify(Chain::Test, "tx1", "ab").await,
            Err(AnchorError::Lookup(_))
        ));
    }

    #[test]
    fn test_digest_in_any_position() {
        let digest = "ab".repeat(32);
        let fields = vec![b"x".to_vec(), format!("prefix:{digest}:suffix").into_bytes()];
        assert!(contains_digest(&fields, &digest));
        assert!(!contains_digest(&fields, &"AB".repeat(32)));
        assert!(!contains_digest(&fields, ""));
        assert!(!contains_digest(&[], &digest));
    }

    #[test]
    fn test_check_entries_tolerates_foreign_outputs() {
        let digest = "ab".repeat(32);
        let entries = vec![
            OpReturnEntry {
                n: Some(0),
                hex: None,
            },
            OpReturnEntry {
                n: Some(1),
                hex: Some("zz".into()),
            },
            OpReturnEntry {
                n: Some(2),
                hex: Some("76a90088ac".into()),
            },
            entry_for(&anchor_fields(&digest)),
        ];

        let result = check_entries(&entries, &digest);
        assert!(result.ok);
        assert_eq!(result.script_hexes.len(), 3);
        assert_eq!(result.found_fields.len(), 5);
    }

    #[test]
    fn test_bare_op_return_script_verifies() {
        let digest = "ab".repeat(32);
        let safe = script::encode_hex(&anchor_fields(&digest)).unwrap();
        let bare = safe[2..].to_string();
        let entries = vec![OpReturnEntry {
            n: None,
            hex: Some(bare),
        }];
        assert!(check_entries(&entries, &digest).ok);
    }

    #[test]
    fn test_entry_json_shape() {
        let entries: Vec<OpReturnEntry> =
            serde_json::from_str(r#"[{"n":1,"hex":"006a0161"},{"n":2},{"other":true}]"#).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].hex.as_deref(), Some("006a0161"));
        assert_eq!(entries[1].hex, None);
    }
}
