//! Encryption provider seam for plan artifacts and state snapshots.
//!
//! Key management and ciphers live outside this crate. Providers hand back
//! opaque ciphertext; [`seal`] and [`open`] wrap it in a small JSON envelope
//! so readers can tell an encrypted payload from a plain one before trying
//! to decode it.
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::types::errors::{Error, ErrorKind, Result};

const ENVELOPE_VERSION: u32 = 1;

/// Kind of payload being protected; providers may use different keys per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    Plan,
    State,
}

pub trait Encryption: Send + Sync {
    /// Identifier recorded in the envelope, e.g. the key provider name.
    fn name(&self) -> &str;

    /// True when this provider encrypts on write.
    fn is_enabled(&self) -> bool;

    /// # Errors
    /// Returns `ErrorKind::Encryption` if the payload cannot be encrypted.
    fn encrypt(&self, kind: Payload, plain: &[u8]) -> Result<Vec<u8>>;

    /// # Errors
    /// Returns `ErrorKind::Encryption` if the payload cannot be decrypted.
    fn decrypt(&self, kind: Payload, cipher: &[u8]) -> Result<Vec<u8>>;
}

/// Encryption turned off: plain payloads pass through, sealed ones are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct Disabled;

impl Encryption for Disabled {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn encrypt(&self, _kind: Payload, plain: &[u8]) -> Result<Vec<u8>> {
        Ok(plain.to_vec())
    }

    fn decrypt(&self, _kind: Payload, cipher: &[u8]) -> Result<Vec<u8>> {
        Ok(cipher.to_vec())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    encryption_version: u32,
    key_provider: String,
    encrypted_data: String,
}

/// Encrypt `plain` with `enc` and wrap it in an envelope. Disabled providers
/// return the input unchanged.
///
/// # Errors
/// Propagates provider errors.
pub fn seal(enc: &dyn Encryption, kind: Payload, plain: &[u8]) -> Result<Vec<u8>> {
    if !enc.is_enabled() {
        return Ok(plain.to_vec());
    }
    let cipher = enc.encrypt(kind, plain)?;
    let env = Envelope {
        encryption_version: ENVELOPE_VERSION,
        key_provider: enc.name().to_string(),
        encrypted_data: STANDARD.encode(cipher),
    };
    serde_json::to_vec(&env).map_err(|e| Error::new(ErrorKind::Encryption, e.to_string()))
}

fn parse_envelope(data: &[u8]) -> Option<Envelope> {
    let v: serde_json::Value = serde_json::from_slice(data).ok()?;
    if v.get("encryption_version").is_none() || v.get("encrypted_data").is_none() {
        return None;
    }
    serde_json::from_value(v).ok()
}

/// Unwrap an envelope if present and decrypt it; plain payloads are returned as-is.
///
/// # Errors
/// Returns `ErrorKind::Encryption` when the payload is sealed but `enc` is
/// disabled, the envelope is unreadable, or the provider fails.
pub fn open(enc: &dyn Encryption, kind: Payload, data: &[u8]) -> Result<Vec<u8>> {
    let Some(env) = parse_envelope(data) else {
        return Ok(data.to_vec());
    };
    if !enc.is_enabled() {
        return Err(Error::new(
            ErrorKind::Encryption,
            format!(
                "the payload is encrypted with key provider {:?}, but no encryption is configured",
                env.key_provider
            ),
        ));
    }
    if env.encryption_version != ENVELOPE_VERSION {
        return Err(Error::new(
            ErrorKind::Encryption,
            format!("unsupported encryption envelope version {}", env.encryption_version),
        ));
    }
    let cipher = STANDARD
        .decode(env.encrypted_data.as_bytes())
        .map_err(|e| Error::new(ErrorKind::Encryption, format!("invalid encrypted payload: {e}")))?;
    enc.decrypt(kind, &cipher)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rot1;

    impl Encryption for Rot1 {
        fn name(&self) -> &str {
            "rot1"
        }
        fn is_enabled(&self) -> bool {
            true
        }
        fn encrypt(&self, _kind: Payload, plain: &[u8]) -> Result<Vec<u8>> {
            Ok(plain.iter().map(|b| b.wrapping_add(1)).collect())
        }
        fn decrypt(&self, _kind: Payload, cipher: &[u8]) -> Result<Vec<u8>> {
            Ok(cipher.iter().map(|b| b.wrapping_sub(1)).collect())
        }
    }

    #[test]
    fn sealed_payload_requires_encryption() {
        let sealed = seal(&Rot1, Payload::Plan, b"{\"a\":1}").unwrap();
        assert_ne!(sealed, b"{\"a\":1}");
        let err = open(&Disabled, Payload::Plan, &sealed).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Encryption);
        assert!(err.msg.contains("rot1"));
        assert_eq!(open(&Rot1, Payload::Plan, &sealed).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn plain_payload_passes_through() {
        assert_eq!(open(&Rot1, Payload::State, b"{}").unwrap(), b"{}");
        assert_eq!(seal(&Disabled, Payload::State, b"{}").unwrap(), b"{}");
    }
}
