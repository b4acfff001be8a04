use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const TEMPLATE_VERSION: u32 = 1;
const TEMPLATE_ALGORITHM: &str = "AES-256-GCM";
const TEMPLATE_NONCE_LEN: usize = 12;

/// Derive the process-wide 32-byte template key from the configured secret.
pub fn derive_template_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Encrypted-at-rest form of a face template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedTemplate {
    pub version: u32,
    pub algorithm: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// A face template as it exists somewhere in the system: a plaintext vector
/// while in memory, an encrypted blob at rest. Disambiguation is structural
/// (the encrypted wrapper is versioned JSON), not a string-prefix sniff.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceTemplate {
    Plaintext(Vec<f64>),
    Encrypted(EncryptedTemplate),
}

impl FaceTemplate {
    /// Classify a stored column value.
    ///
    /// Anything that is not the encrypted wrapper is treated as a legacy
    /// plaintext JSON vector; values that parse as neither become an empty
    /// plaintext template so reads stay total.
    pub fn from_stored(stored: &str) -> FaceTemplate {
        if let Ok(wrapper) = serde_json::from_str::<EncryptedTemplate>(stored) {
            return FaceTemplate::Encrypted(wrapper);
        }
        match serde_json::from_str::<Vec<f64>>(stored) {
            Ok(vector) => FaceTemplate::Plaintext(vector),
            Err(err) => {
                log::warn!("Stored face template is neither encrypted nor a vector: {err}");
                FaceTemplate::Plaintext(Vec::new())
            }
        }
    }
}

#[derive(Debug)]
pub enum TemplateError {
    Encrypt(String),
    Serialize(serde_json::Error),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Encrypt(msg) => write!(f, "template encryption failed: {msg}"),
            TemplateError::Serialize(err) => write!(f, "template serialization failed: {err}"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Encrypt a plaintext embedding for storage.
///
/// Returns the JSON-serialized [`EncryptedTemplate`] wrapper that goes into
/// the database column. Every write path that sets a template must pass
/// through here exactly once; see [`seal_template`] for the idempotent entry
/// point used by update call sites.
pub fn encrypt_template(vector: &[f64], key: &[u8; 32]) -> Result<String, TemplateError> {
    let plaintext = serde_json::to_vec(vector).map_err(TemplateError::Serialize)?;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| TemplateError::Encrypt("invalid AES-GCM key length".into()))?;
    let mut nonce = [0u8; TEMPLATE_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
        .map_err(|err| TemplateError::Encrypt(err.to_string()))?;

    let wrapper = EncryptedTemplate {
        version: TEMPLATE_VERSION,
        algorithm: TEMPLATE_ALGORITHM.to_string(),
        nonce: general_purpose::STANDARD.encode(nonce),
        ciphertext: general_purpose::STANDARD.encode(ciphertext),
    };
    serde_json::to_string(&wrapper).map_err(TemplateError::Serialize)
}

/// Produce the stored form for a template value, encrypting plaintext input
/// and passing already-encrypted input through unchanged.
pub fn seal_template(template: &FaceTemplate, key: &[u8; 32]) -> Result<String, TemplateError> {
    match template {
        FaceTemplate::Plaintext(vector) => encrypt_template(vector, key),
        FaceTemplate::Encrypted(wrapper) => {
            serde_json::to_string(wrapper).map_err(TemplateError::Serialize)
        }
    }
}

/// Total decrypt: recover the embedding from a stored column value.
///
/// Absent values yield `[]`; legacy plaintext vectors are returned unchanged;
/// encrypted blobs are decrypted. Every failure mode (wrong key, corrupt
/// blob, non-vector payload after decrypt) logs and yields `[]` — this never
/// fails the caller.
pub fn decrypt_template(stored: Option<&str>, key: &[u8; 32]) -> Vec<f64> {
    let stored = match stored {
        Some(s) if !s.is_empty() => s,
        _ => return Vec::new(),
    };

    let wrapper = match FaceTemplate::from_stored(stored) {
        FaceTemplate::Plaintext(vector) => return vector,
        FaceTemplate::Encrypted(wrapper) => wrapper,
    };

    match try_decrypt(&wrapper, key) {
        Ok(vector) => vector,
        Err(reason) => {
            log::warn!("Face template decryption failed: {reason}");
            Vec::new()
        }
    }
}

fn try_decrypt(wrapper: &EncryptedTemplate, key: &[u8; 32]) -> Result<Vec<f64>, String> {
    if wrapper.algorithm != TEMPLATE_ALGORITHM {
        return Err(format!("unsupported algorithm '{}'", wrapper.algorithm));
    }
    if wrapper.version != TEMPLATE_VERSION {
        return Err(format!("unsupported version {}", wrapper.version));
    }

    let nonce = general_purpose::STANDARD
        .decode(wrapper.nonce.trim())
        .map_err(|err| format!("invalid nonce encoding: {err}"))?;
    if nonce.len() != TEMPLATE_NONCE_LEN {
        return Err(format!(
            "expected nonce of {TEMPLATE_NONCE_LEN} bytes but found {}",
            nonce.len()
        ));
    }
    let ciphertext = general_purpose::STANDARD
        .decode(wrapper.ciphertext.trim())
        .map_err(|err| format!("invalid ciphertext encoding: {err}"))?;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| "invalid AES-GCM key length".to_string())?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|err| format!("decrypt error: {err}"))?;

    serde_json::from_slice(&plaintext)
        .map_err(|err| format!("decrypted payload is not a vector: {err}"))
}
