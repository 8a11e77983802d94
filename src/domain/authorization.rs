use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An authorization token binding a signer wallet, a single-use nonce and a
/// deadline to one payload hash.
///
/// The envelope always travels together with the payload it authorizes, so a
/// verifier can recompute the hash independently; the payload is never
/// transmitted hashed-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub wallet_address: String,
    pub nonce: String,
    pub deadline: DateTime<Utc>,
    pub signature: String,
}

impl SignatureEnvelope {
    /// Produces a valid envelope for `payload_hash` under the deterministic
    /// hash scheme. This is the signer half of the demo scheme; a production
    /// deployment replaces both halves with real asymmetric signing.
    pub fn issue(
        wallet_address: &str,
        nonce: &str,
        deadline: DateTime<Utc>,
        payload_hash: &str,
    ) -> Result<Self> {
        Ok(Self {
            wallet_address: wallet_address.to_string(),
            nonce: nonce.to_string(),
            deadline,
            signature: expected_signature(wallet_address, nonce, payload_hash)?,
        })
    }

    /// Key under which this envelope is marked spent in the used-nonce set.
    pub fn nonce_key(&self, payload_hash: &str) -> String {
        format!(
            "{}:{}:{}",
            self.wallet_address.to_lowercase(),
            self.nonce,
            payload_hash
        )
    }
}

/// Canonical JSON rendering of a payload: object keys sorted, no whitespace.
///
/// Round-tripping through `serde_json::Value` drops struct field order, so two
/// structurally equal payloads always canonicalize identically.
pub fn canonical_json<T: Serialize>(payload: &T) -> Result<String> {
    let value = serde_json::to_value(payload)?;
    Ok(serde_json::to_string(&value)?)
}

/// Hex-encoded SHA-256 of the canonical payload rendering.
pub fn payload_hash<T: Serialize>(payload: &T) -> Result<String> {
    Ok(sha256_hex(canonical_json(payload)?.as_bytes()))
}

#[derive(Serialize)]
struct SignedDigest<'a> {
    wallet: String,
    nonce: &'a str,
    payload_hash: &'a str,
}

/// The signature the verifier expects for `(wallet, nonce, payload_hash)`.
///
/// Deterministic hash stand-in for asymmetric message signing; the wallet is
/// lowercased so mixed-case addresses verify against one identity.
pub fn expected_signature(wallet: &str, nonce: &str, payload_hash: &str) -> Result<String> {
    let digest = SignedDigest {
        wallet: wallet.to_lowercase(),
        nonce,
        payload_hash,
    };
    Ok(sha256_hex(canonical_json(&digest)?.as_bytes()))
}

/// Verifies `envelope` against `payload_hash` at wall-clock `now`.
///
/// Deadline first, then digest equality. The caller still owns nonce-replay
/// rejection: check-and-consume against the used-nonce set happens atomically
/// with instruction creation, after this verification succeeds.
pub fn verify(payload_hash: &str, envelope: &SignatureEnvelope, now: DateTime<Utc>) -> Result<()> {
    if envelope.deadline < now {
        return Err(PayoutError::SignatureExpired);
    }
    let expected = expected_signature(&envelope.wallet_address, &envelope.nonce, payload_hash)?;
    if expected != envelope.signature {
        return Err(PayoutError::SignatureMismatch);
    }
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
