/// Anchor client: turns a field list into a broadcast anchor transaction.
///
/// Transaction outputs:
/// - Output 0: dust payment back to the signer's own address
/// - Output 1: OP_FALSE OP_RETURN <fields...> (0 sats, unspendable)
///
/// Key and network checks happen before the chain client is touched, so a
/// misconfigured key never reaches the network.
use std::sync::Arc;

use tracing::{info, warn};

use super::{
    AnchorResult, BroadcastOutcome, BroadcastRequest, Chain, ChainClient, PaymentOutput,
    SigningKey,
};
use crate::error::{AnchorError, Result};
use crate::script;

pub struct AnchorClient {
    chain_client: Arc<dyn ChainClient>,
}

impl AnchorClient {
    pub fn new(chain_client: Arc<dyn ChainClient>) -> Self {
        Self { chain_client }
    }

    /// Anchor `fields` on `chain`, signed with the WIF `signing_material`.
    ///
    /// Broadcast failures are returned as `AnchorError::Broadcast` and are
    /// never retried here: the transaction may already be on the network.
    pub async fn anchor(
        &self,
        signing_material: &str,
        chain: Chain,
        dust_sats: u64,
        fields: &[Vec<u8>],
    ) -> Result<AnchorResult> {
        let signing_key = SigningKey::from_wif(signing_material)?;
        signing_key.ensure_chain(chain)?;

        let data_script = script::encode(fields)?;
        let payment = PaymentOutput {
            address: signing_key.address().to_string(),
            satoshis: dust_sats,
        };

        info!(
            chain = %chain,
            client = self.chain_client.name(),
            address = %payment.address,
            dust_sats,
            script_bytes = data_script.len(),
            "Broadcasting anchor transaction"
        );

        let request = BroadcastRequest {
            chain,
            signing_key,
            payments: vec![payment],
            data_fields: fields.to_vec(),
            data_script,
        };

        let outcome = self.chain_client.broadcast(request).await.map_err(|e| match e {
            AnchorError::Broadcast(msg) => AnchorError::Broadcast(msg),
            other => AnchorError::Broadcast(format!("{}: {other}", self.chain_client.name())),
        })?;

        match outcome {
            BroadcastOutcome::Broadcast { txid, raw_response } => {
                let txid = txid.trim().to_string();
                if txid.is_empty() {
                    return Err(AnchorError::Broadcast(format!(
                        "{} returned an empty txid: {raw_response}",
                        self.chain_client.name()
                    )));
                }
                info!(chain = %chain, txid = %txid, "Anchor broadcast accepted");
                Ok(AnchorResult { txid, raw_response })
            }
            BroadcastOutcome::Rejected { reason } => {
                warn!(chain = %chain, reason = %reason, "Anchor broadcast rejected");
                Err(AnchorError::Broadcast(reason))
            }
        }
    }
}
