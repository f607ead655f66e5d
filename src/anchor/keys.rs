/// Signing material for anchor transactions.
///
/// BSV keeps Bitcoin's legacy WIF and P2PKH address encodings, so the
/// `bitcoin` crate parses the key and derives the address. The network is
/// checked by address prefix: test-network addresses start with `m`/`n`
/// (`2` for P2SH), main-network ones with `1` (`3` for P2SH).
use std::fmt;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, PrivateKey, PublicKey};

use super::Chain;
use crate::error::{AnchorError, Result};

/// A parsed WIF private key and its P2PKH address.
#[derive(Clone)]
pub struct SigningKey {
    key: PrivateKey,
    address: String,
}

impl SigningKey {
    /// Parse a WIF-encoded private key.
    pub fn from_wif(wif: &str) -> Result<Self> {
        let wif = wif.trim();
        if wif.is_empty() {
            return Err(AnchorError::InvalidKey(
                "No signing key configured (set BSV_WIF_TESTNET)".into(),
            ));
        }

        let key = PrivateKey::from_wif(wif)
            .map_err(|e| AnchorError::InvalidKey(format!("Invalid WIF key: {e}")))?;

        let secp = Secp256k1::new();
        let public_key = PublicKey::from_private_key(&secp, &key);
        let address = Address::p2pkh(public_key, key.network).to_string();

        Ok(Self { key, address })
    }

    /// The signer's own P2PKH address (receives the dust output).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    /// Fail unless the derived address follows `chain`'s prefix convention.
    pub fn ensure_chain(&self, chain: Chain) -> Result<()> {
        let expected: &[char] = match chain {
            Chain::Test => &['m', 'n', '2'],
            Chain::Main => &['1', '3'],
        };

        if self.address.starts_with(expected) {
            Ok(())
        } else {
            Err(AnchorError::NetworkMismatch(format!(
                "Key does not look like a {chain}-network key. Derived address: {}",
                self.address
            )))
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) const MAIN_WIF: &str = "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ";
#[cfg(test)]
pub(crate) const TEST_WIF: &str = "cVt4o7BGAig1UXywgGSmARhxMdzP5qvQsxKkSsc1XEkw3tDTQFpy";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_key_address() {
        let key = SigningKey::from_wif(MAIN_WIF).unwrap();
        assert!(key.address().starts_with('1'));
        assert!(key.ensure_chain(Chain::Main).is_ok());
        assert!(matches!(
            key.ensure_chain(Chain::Test),
            Err(AnchorError::NetworkMismatch(_))
        ));
    }

    #[test]
    fn test_test_key_address() {
        let key = SigningKey::from_wif(TEST_WIF).unwrap();
        assert!(key.address().starts_with(['m', 'n']));
        assert!(key.ensure_chain(Chain::Test).is_ok());
        assert!(matches!(
            key.ensure_chain(Chain::Main),
            Err(AnchorError::NetworkMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_wif() {
        assert!(matches!(
            SigningKey::from_wif(""),
            Err(AnchorError::InvalidKey(_))
        ));
        assert!(matches!(
            SigningKey::from_wif("not-a-key"),
            Err(AnchorError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = SigningKey::from_wif(TEST_WIF).unwrap();
        let shown = format!("{key:?}");
        assert!(shown.contains(key.address()));
        assert!(!shown.contains(TEST_WIF));
    }
}
