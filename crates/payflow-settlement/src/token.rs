//! Order token codec.
//!
//! A token is `base64url(nonce ‖ AES-256-GCM(sign_key, order_id))` with a
//! fresh 96-bit nonce per encoding, so the same order mints a different
//! token every time. Tokens are bound to a domain-separation AAD; any
//! tampering, truncation or wrong key fails closed with
//! [`PayflowError::TokenInvalid`].

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use payflow_types::constants::PAY_URL_TOKEN_PARAM;
use payflow_types::{OrderId, PayflowError, Result, SignKey};

/// Associated data bound into every token.
const TOKEN_AAD: &[u8] = b"payflow:order-token:v1";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SEALED_LEN: usize = NONCE_LEN + 16 + TAG_LEN;

fn cipher(key: &SignKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Seal `order_id` under the merchant's key.
pub fn encode(key: &SignKey, order_id: OrderId) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher(key)
        .encrypt(
            &nonce,
            Payload {
                msg: order_id.as_bytes(),
                aad: TOKEN_AAD,
            },
        )
        .map_err(|_| PayflowError::Internal("order token encryption failed".to_string()))?;

    let mut raw = Vec::with_capacity(SEALED_LEN);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&sealed);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Open a token sealed by [`encode`] under the same key.
pub fn decode(key: &SignKey, token: &str) -> Result<OrderId> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| PayflowError::TokenInvalid)?;
    if raw.len() != SEALED_LEN {
        return Err(PayflowError::TokenInvalid);
    }
    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let plain = cipher(key)
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: TOKEN_AAD,
            },
        )
        .map_err(|_| PayflowError::TokenInvalid)?;
    let bytes: [u8; 16] = plain.try_into().map_err(|_| PayflowError::TokenInvalid)?;
    Ok(OrderId::from_bytes(bytes))
}

/// Payer-facing link carrying only the token.
#[must_use]
pub fn pay_link(pay_url: &str, token: &str) -> String {
    let sep = if pay_url.contains('?') { '&' } else { '?' };
    format!("{pay_url}{sep}{PAY_URL_TOKEN_PARAM}={token}")
}
