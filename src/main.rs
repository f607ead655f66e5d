use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use evidence_anchor::anchor::{AnchorPayload, Chain};
use evidence_anchor::config::Settings;
use evidence_anchor::error::{AnchorError, Result};
use evidence_anchor::evidence::EvidenceRecord;
use evidence_anchor::pipeline::poll_verification;
use evidence_anchor::script;
use evidence_anchor::verify::{Verifier, WhatsOnChain, WhatsOnChainConfig};

#[derive(Parser)]
#[command(name = "evidence-anchor")]
#[command(about = "Hash evidence records and check their OP_RETURN anchors")]
#[command(version)]
struct Cli {
    /// Ledger network (overrides BSV_CHAIN)
    #[arg(long, global = true)]
    chain: Option<Chain>,

    /// Explorer base URL (overrides WOC_BASE)
    #[arg(long, global = true)]
    woc_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute the digest of a persisted evidence record
    Digest {
        /// Evidence JSON file
        path: PathBuf,
    },
    /// Encode fields into a data-carrier script (hex)
    Encode {
        /// Fields, in push order
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Decode a data-carrier script (hex) into its fields
    Decode {
        script_hex: String,
    },
    /// Poll the explorer until the digest shows up in the transaction
    Verify {
        #[arg(long)]
        txid: String,
        /// Expected digest (64 hex chars)
        #[arg(long)]
        digest: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("evidence_anchor=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::from_env()?;
    if let Some(chain) = cli.chain {
        settings.chain = chain;
    }
    if let Some(base) = cli.woc_base {
        settings.woc_base = base.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Digest { path } => {
            let data = std::fs::read(&path)?;
            let record = EvidenceRecord::from_json(&data)?;
            let recomputed = record.recompute_digest()?;

            println!("stored:     {}", record.digest());
            println!("recomputed: {recomputed}");
            if let Some(anchoring) = record.anchoring() {
                let verified = match anchoring.verified {
                    Some(true) => "verified",
                    Some(false) => "not yet verified",
                    None => "unchecked",
                };
                println!("txid:       {} ({verified})", anchoring.txid);
            }

            if recomputed == record.digest() {
                println!("OK");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("MISMATCH");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Encode { fields } => {
            println!("{}", script::encode_hex(&fields)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Decode { script_hex } => {
            let fields = script::decode_hex(&script_hex)?;
            for (i, field) in fields.iter().enumerate() {
                println!("[{i}] {}", String::from_utf8_lossy(field));
            }
            match AnchorPayload::from_fields(&fields) {
                Ok(payload) => println!(
                    "anchor: scene={} sha256={} at={} model={}",
                    payload.scene_id, payload.sha256_hex, payload.created_at_utc, payload.model
                ),
                Err(AnchorError::InvalidScript(reason)) => {
                    println!("not an evidence anchor: {reason}")
                }
                Err(e) => return Err(e),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { txid, digest } => {
            let explorer = WhatsOnChain::new(WhatsOnChainConfig {
                base_url: settings.woc_base.clone(),
            });
            let verifier = Verifier::new(Arc::new(explorer));
            let outcome = poll_verification(
                &verifier,
                settings.chain,
                &txid,
                &digest,
                &settings.retry_policy(),
            )
            .await;

            if outcome.verified {
                println!("verified ({} attempts)", outcome.attempts);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("not yet verified after {} attempts", outcome.attempts);
                Ok(ExitCode::from(2))
            }
        }
    }
}
