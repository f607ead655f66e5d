/// Anchor-and-verify orchestrator.
///
/// Coordinates the full anchoring flow for one sealed evidence record:
/// 1. Build the on-chain payload (tag, scene, digest, timestamp, model)
/// 2. Broadcast it through the anchor client
/// 3. Poll the explorer under the retry policy until the digest shows up
/// 4. Return the record with its anchoring outcome attached
///
/// Only a failed broadcast is an error. A digest that never shows up is a
/// soft outcome (`verified = false`): the transaction is already on the
/// network and must not be re-submitted.
use tracing::{info, warn};

use crate::anchor::{AnchorClient, AnchorPayload, Chain};
use crate::error::{AnchorError, Result};
use crate::evidence::{Anchoring, EvidenceRecord};
use crate::retry::RetryPolicy;
use crate::verify::{Verifier, VerifyResult};

/// Aggregate result of polling the explorer.
#[derive(Debug, Clone, Default)]
pub struct VerificationOutcome {
    pub verified: bool,
    /// Polls made, including failed lookups.
    pub attempts: u32,
    /// The last poll that returned a response, if any did.
    pub last_result: Option<VerifyResult>,
}

/// Poll `verifier` until the digest is found or the policy gives up.
///
/// A failed lookup counts as "not found yet" for that attempt.
pub async fn poll_verification(
    verifier: &Verifier,
    chain: Chain,
    txid: &str,
    expected_digest_hex: &str,
    policy: &RetryPolicy,
) -> VerificationOutcome {
    let mut outcome = VerificationOutcome::default();

    for attempt in 1..=policy.attempts() {
        outcome.attempts = attempt;

        match verifier.verify(chain, txid, expected_digest_hex).await {
            Ok(result) => {
                let ok = result.ok;
                outcome.last_result = Some(result);
                if ok {
                    info!(txid = %txid, attempt, "Digest found on-chain");
                    outcome.verified = true;
                    return outcome;
                }
            }
            Err(e) => {
                warn!(txid = %txid, attempt, error = %e, "Verification lookup failed");
            }
        }

        if let Some(delay) = policy.delay_after(attempt) {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        txid = %txid,
        attempts = outcome.attempts,
        "Digest not visible yet, leaving record unverified"
    );
    outcome
}

/// Anchor `record` on `chain` and verify it.
///
/// Returns a new record with `txid` and `verified` set; `record` itself is
/// left untouched so the caller can still persist the pre-anchor state if
/// the broadcast fails.
pub async fn anchor_and_verify(
    record: &EvidenceRecord,
    chain: Chain,
    signing_material: &str,
    dust_sats: u64,
    anchor_client: &AnchorClient,
    verifier: &Verifier,
    policy: &RetryPolicy,
) -> Result<EvidenceRecord> {
    if record.chain() != chain {
        return Err(AnchorError::NetworkMismatch(format!(
            "Record was sealed for the {} network, anchoring requested on {chain}",
            record.chain()
        )));
    }

    let payload = AnchorPayload {
        scene_id: record.scene_id_or_default().to_string(),
        sha256_hex: record.digest().to_string(),
        created_at_utc: record.content().created_at_utc,
        model: record.content().model_weights.clone(),
    };

    info!(
        chain = %chain,
        scene_id = %payload.scene_id,
        digest = %payload.sha256_hex,
        "Anchoring evidence"
    );

    let anchored = anchor_client
        .anchor(signing_material, chain, dust_sats, &payload.to_fields())
        .await?;

    let outcome =
        poll_verification(verifier, chain, &anchored.txid, record.digest(), policy).await;

    Ok(record.clone().with_anchoring(Anchoring {
        txid: anchored.txid,
        verified: Some(outcome.verified),
    }))
}
