//! Versioned checkpoint state and its token codec.
//!
//! The token handed to callers is `v<version>.<payload>.<digest>` where
//! `payload` is the URL-safe base64 of the checkpoint's JSON and `digest` is a
//! SHA-256 prefix over the JSON bytes. Callers must treat it as opaque and
//! return it unchanged; any altered byte decodes as `CorruptCheckpoint`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RunnerError;
use crate::job::Job;
use crate::outcome::RunSummary;
use crate::record::OrderingKey;

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Hex characters of the SHA-256 digest kept in a token.
const DIGEST_HEX_LEN: usize = 16;

/// Everything needed to continue a job: what it is, where it stopped, and what
/// it has done so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub job: Job,
    /// Key of the last attempted item; `None` before the first item.
    pub position: Option<OrderingKey>,
    pub summary: RunSummary,
}

impl Checkpoint {
    /// Checkpoint for a job that has not attempted anything yet.
    pub fn initial(job: Job) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            job,
            position: None,
            summary: RunSummary::default(),
        }
    }
}

/// Opaque resume token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointToken(String);

impl CheckpointToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for CheckpointToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize a checkpoint into a token.
pub fn encode(checkpoint: &Checkpoint) -> Result<CheckpointToken, RunnerError> {
    let json = serde_json::to_vec(checkpoint).map_err(|e| RunnerError::Encode(e.to_string()))?;
    Ok(CheckpointToken(format!(
        "v{}.{}.{}",
        checkpoint.version,
        URL_SAFE_NO_PAD.encode(&json),
        digest(&json)
    )))
}

/// Parse and verify a token.
pub fn decode(token: &CheckpointToken) -> Result<Checkpoint, RunnerError> {
    let mut parts = token.as_str().trim().splitn(3, '.');
    let (Some(version), Some(payload), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(RunnerError::corrupt_checkpoint("malformed token"));
    };

    let version: u32 = version
        .strip_prefix('v')
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| RunnerError::corrupt_checkpoint("malformed version prefix"))?;
    if version != CHECKPOINT_VERSION {
        return Err(RunnerError::corrupt_checkpoint(format!(
            "unsupported checkpoint version {version}"
        )));
    }

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| RunnerError::corrupt_checkpoint(format!("payload is not base64: {e}")))?;

    if digest(&json) != expected {
        return Err(RunnerError::corrupt_checkpoint("digest mismatch"));
    }

    let checkpoint: Checkpoint = serde_json::from_slice(&json)
        .map_err(|e| RunnerError::corrupt_checkpoint(format!("payload is not a checkpoint: {e}")))?;

    if checkpoint.version != version {
        return Err(RunnerError::corrupt_checkpoint(format!(
            "version prefix v{version} does not match payload version {}",
            checkpoint.version
        )));
    }

    Ok(checkpoint)
}

fn digest(bytes: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(bytes));
    hex.truncate(DIGEST_HEX_LEN);
    hex
}
