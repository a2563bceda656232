//! HMAC-SHA256 request signing.
//!
//! The venue authenticates both the streaming `authKey` handshake and REST
//! calls with the same scheme:
//!
//! ```text
//! signature = hex(HMAC_SHA256(secret, verb + path + expires + body))
//! ```
//!
//! `expires` is a Unix timestamp in seconds rendered as a decimal string and
//! `body` is the exact byte sequence sent on the wire (empty for GET).

use crate::error::{CoreError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// API key pair used for signing.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    /// True when either half of the pair is missing.
    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty() || self.api_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Stateless signer over a credential pair.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    /// Sign `verb + path + expires + body`, returning lowercase hex.
    ///
    /// `path` must include the `/api/v1` prefix and any query string.
    pub fn sign(&self, verb: &str, path: &str, expires: u64, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| CoreError::Signing(e.to_string()))?;
        mac.update(verb.as_bytes());
        mac.update(path.as_bytes());
        mac.update(expires.to_string().as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
