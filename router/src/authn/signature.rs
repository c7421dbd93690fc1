//! Push payload signature verification
//!
//! Signatures are `sha256=<hex>` where `<hex>` is the lowercase HMAC-SHA256 of
//! the raw request body keyed with the shared secret. Verification always runs
//! against the bytes exactly as received.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Prefix of every signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

const DIGEST_HEX_LEN: usize = 64;

/// Verifies payload signatures against a shared secret
pub struct SignatureVerifier {
    secret: Arc<SecretString>,
}

impl SignatureVerifier {
    pub fn new(secret: Arc<SecretString>) -> Self {
        Self { secret }
    }

    /// True iff `signature_header` is the signature of `body` under this secret
    pub fn verify(&self, body: &[u8], signature_header: Option<&str>) -> bool {
        verify(self.secret.expose_secret().as_bytes(), body, signature_header)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

/// Compute the signature header value for `body`
pub fn sign(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a signature header. Never panics; absent, malformed or mismatched
/// headers all yield `false`. The digest comparison is constant-time.
pub fn verify(secret: &[u8], body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(header) = signature_header else {
        return false;
    };
    let Some(digest_hex) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    if digest_hex.len() != DIGEST_HEX_LEN
        || !digest_hex
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
