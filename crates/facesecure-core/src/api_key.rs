use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bearer values look like `ak_live_1a2b3c4d_<64 hex chars>`.
pub const KEY_PREFIX: &str = "ak_";
const KEY_ID_BYTES: usize = 4;
const SECRET_BYTES: usize = 32;
const WEBHOOK_SECRET_BYTES: usize = 24;

/// Deployment environment a key is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Live => "live",
        }
    }
}

/// Output of key generation. `raw_key` is shown to the owner exactly once;
/// only `key_hash` is persisted and the raw value is unrecoverable afterward.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub raw_key: String,
    pub key_id: String,
    pub key_hash: String,
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a fresh access key for an environment.
pub fn generate_api_key(environment: Environment) -> GeneratedKey {
    let key_id = random_hex(KEY_ID_BYTES);
    let secret = random_hex(SECRET_BYTES);
    let raw_key = format!("{KEY_PREFIX}{}_{key_id}_{secret}", environment.as_str());
    let key_hash = hash_api_key(&raw_key);

    GeneratedKey {
        raw_key,
        key_id,
        key_hash,
    }
}

/// Hash a raw bearer value for storage or lookup.
pub fn hash_api_key(raw_key: &str) -> String {
    let digest = Sha256::digest(raw_key.as_bytes());
    format!("{digest:x}")
}

/// Display prefix for dashboards: enough to recognize a key, never enough to
/// use one.
pub fn key_prefix(raw_key: &str) -> String {
    let shown: String = raw_key.chars().take(12).collect();
    format!("{shown}...")
}

/// Whether a presented bearer value has the expected format marker.
pub fn has_key_prefix(raw_key: &str) -> bool {
    raw_key.starts_with(KEY_PREFIX)
}

/// Generate a per-key webhook signing secret (`whsec_` + 48 hex chars).
pub fn generate_webhook_secret() -> String {
    format!("whsec_{}", random_hex(WEBHOOK_SECRET_BYTES))
}
