/// Runtime settings, read from the environment (and `.env` if present).
///
/// | Variable             | Default                        |
/// |----------------------|--------------------------------|
/// | `BSV_CHAIN`          | `test` (anything but `main`)   |
/// | `BSV_WIF_TESTNET`    | empty (anchoring disabled)     |
/// | `BSV_DUST_SATS`      | `546`                          |
/// | `WOC_BASE`           | `https://api.whatsonchain.com` |
/// | `VERIFY_ATTEMPTS`    | `6`                            |
/// | `VERIFY_INTERVAL_MS` | `1000`                         |
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::anchor::{Chain, DEFAULT_DUST_SATS};
use crate::error::{AnchorError, Result};
use crate::retry::RetryPolicy;
use crate::verify::explorer::DEFAULT_BASE_URL;

#[derive(Clone)]
pub struct Settings {
    pub chain: Chain,
    /// WIF signing material. Never logged.
    pub wif: String,
    pub dust_sats: u64,
    pub woc_base: String,
    pub verify_attempts: u32,
    pub verify_interval: Duration,
}

impl Settings {
    /// Load settings from the process environment, after `.env`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chain = lookup("BSV_CHAIN")
            .map(|v| Chain::from_setting(&v))
            .unwrap_or_default();

        let wif = lookup("BSV_WIF_TESTNET").unwrap_or_default().trim().to_string();

        let woc_base = lookup("WOC_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let verify_interval_ms: u64 = parse_or(&lookup, "VERIFY_INTERVAL_MS", 1000)?;

        Ok(Self {
            chain,
            wif,
            dust_sats: parse_or(&lookup, "BSV_DUST_SATS", DEFAULT_DUST_SATS)?,
            woc_base,
            verify_attempts: parse_or(&lookup, "VERIFY_ATTEMPTS", 6)?,
            verify_interval: Duration::from_millis(verify_interval_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.verify_attempts, self.verify_interval)
    }

    /// Whether signing material is configured at all.
    pub fn can_anchor(&self) -> bool {
        !self.wif.is_empty()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AnchorError::Config(format!("{key}={raw:?}: {e}"))),
        _ => Ok(default),
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("chain", &self.chain)
            .field("wif", &if self.wif.is_empty() { "<unset>" } else { "<redacted>" })
            .field("dust_sats", &self.dust_sats)
            .field("woc_base", &self.woc_base)
            .field("verify_attempts", &self.verify_attempts)
            .field("verify_interval", &self.verify_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.chain, Chain::Test);
        assert!(!s.can_anchor());
        assert_eq!(s.dust_sats, 546);
        assert_eq!(s.woc_base, "https://api.whatsonchain.com");
        assert_eq!(s.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("BSV_CHAIN", "Main"),
            ("BSV_WIF_TESTNET", "  cSecret \n"),
            ("BSV_DUST_SATS", "1000"),
            ("WOC_BASE", "http://localhost:8080/"),
            ("VERIFY_ATTEMPTS", "3"),
            ("VERIFY_INTERVAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(s.chain, Chain::Main);
        assert_eq!(s.wif, "cSecret");
        assert_eq!(s.dust_sats, 1000);
        assert_eq!(s.woc_base, "http://localhost:8080");
        assert_eq!(
            s.retry_policy(),
            RetryPolicy::fixed(3, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_unknown_chain_falls_back_to_test() {
        let s = settings(&[("BSV_CHAIN", "regtest")]).unwrap();
        assert_eq!(s.chain, Chain::Test);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        assert!(matches!(
            settings(&[("BSV_DUST_SATS", "lots")]),
            Err(AnchorError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_wif() {
        let s = settings(&[("BSV_WIF_TESTNET", "cSuperSecretKey")]).unwrap();
        let shown = format!("{s:?}");
        assert!(!shown.contains("cSuperSecretKey"));
        assert!(shown.contains("<redacted>"));
    }
}
