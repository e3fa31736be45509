//! Merchant registry entries and their per-account sign keys.

use std::fmt;

use rand::RngCore;

use crate::{ClientId, PayflowError, Result, UserId};

/// 256-bit per-merchant secret used to seal order tokens. Never transmitted.
#[derive(Clone, PartialEq, Eq)]
pub struct SignKey([u8; 32]);

impl SignKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| PayflowError::InvalidSignKey {
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| PayflowError::InvalidSignKey {
                reason: format!("expected 32 bytes, got {}", v.len()),
            })?;
        Ok(Self(bytes))
    }

    /// Fresh random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignKey(..)")
    }
}

/// A merchant registration: the user that receives funds, the client id
/// used to authenticate order creation, and the token sealing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merchant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub sign_key: SignKey,
}

impl Merchant {
    #[must_use]
    pub fn new(user_id: UserId, client_id: ClientId) -> Self {
        Self {
            user_id,
            client_id,
            sign_key: SignKey::generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_key_roundtrip() {
        let hex_key = "00".repeat(31) + "ff";
        let key = SignKey::from_hex(&hex_key).unwrap();
        assert_eq!(key.as_bytes()[31], 0xff);
    }

    #[test]
    fn short_key_rejected() {
        let err = SignKey::from_hex("abcd").unwrap_err();
        assert!(matches!(err, PayflowError::InvalidSignKey { .. }));
        assert!(SignKey::from_hex("zz").is_err());
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(SignKey::generate(), SignKey::generate());
    }

    #[test]
    fn debug_does_not_leak() {
        let key = SignKey::from_bytes([7u8; 32]);
        assert_eq!(format!("{key:?}"), "SignKey(..)");
    }
}
