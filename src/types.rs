//! Shared types: contexts, proof bundles, and accepted-signal records.

use crate::utils::{field_from_bytes, field_to_bytes, hash_to_field};
use anyhow::{Context as _, Result};
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const HASH_SIZE: usize = 32;

const CONTEXT_DOMAIN: &[u8] = b"anon-signals:context";

/// An epoch/group context that scopes nullifiers.
///
/// The same identity produces the same nullifier within one context and
/// unrelated nullifiers across contexts, so members can signal once per
/// poll without being linkable between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochContext(pallas::Base);

impl EpochContext {
    /// Derives a context from an application label, e.g. a poll id.
    #[must_use]
    pub fn new(label: &[u8]) -> Self {
        Self(hash_to_field(CONTEXT_DOMAIN, label))
    }

    #[must_use]
    pub fn to_field(self) -> pallas::Base {
        self.0
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; HASH_SIZE] {
        field_to_bytes(self.0)
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// The public bundle a member submits for verification.
///
/// Field elements travel as canonical hex strings; the proof itself is
/// opaque bytes from the proving backend. Everything here is public: the
/// nullifier hash is deterministic per (identity, context) but statistically
/// unlinkable to the identity's commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Merkle root claimed to contain the signer's commitment (32-byte hex).
    pub merkle_root: String,
    /// `Poseidon(context, nullifier_secret)` (32-byte hex).
    pub nullifier_hash: String,
    /// Binding commitment to the message (32-byte hex).
    pub signal_hash: String,
    /// The context the nullifier is scoped to (32-byte hex).
    pub context: String,
    /// Opaque proof bytes from the proving backend.
    pub proof: Vec<u8>,
    /// Unix timestamp at proof generation.
    pub timestamp: u64,
}

impl ProofBundle {
    /// Allowed clock skew for bundles stamped in the future.
    pub const TIMESTAMP_TOLERANCE_SECS: u64 = 30;
    /// Oldest acceptable bundle age.
    pub const TIMESTAMP_MAX_AGE_SECS: u64 = 86400;

    /// Structural validation with the default timestamp policy.
    ///
    /// # Errors
    /// Returns an error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(
            Self::TIMESTAMP_TOLERANCE_SECS,
            Self::TIMESTAMP_MAX_AGE_SECS,
        )
    }

    /// Structural validation: every field decodes to the right shape and the
    /// timestamp is plausible. Cryptographic checks happen in the verifier;
    /// this only rejects bundles that could never verify.
    ///
    /// # Errors
    /// Returns an error naming the offending field.
    pub fn validate_with(&self, tolerance_secs: u64, max_age_secs: u64) -> Result<()> {
        debug!(
            "validating bundle: proof={} bytes, timestamp={}",
            self.proof.len(),
            self.timestamp
        );

        if self.proof.is_empty() {
            return Err(anyhow::anyhow!("proof bytes are missing"));
        }

        self.merkle_root_field()?;
        self.nullifier_field()?;
        self.signal_field()?;
        self.context_field()?;

        let now = unix_now()?;
        if self.timestamp > now + tolerance_secs {
            return Err(anyhow::anyhow!(
                "bundle timestamp {} is in the future (now {}, tolerance {}s)",
                self.timestamp,
                now,
                tolerance_secs
            ));
        }
        if now > self.timestamp + max_age_secs {
            return Err(anyhow::anyhow!(
                "bundle timestamp {} is too old (now {}, max age {}s)",
                self.timestamp,
                now,
                max_age_secs
            ));
        }

        Ok(())
    }

    pub fn merkle_root_field(&self) -> Result<pallas::Base> {
        decode_field(&self.merkle_root, "merkle_root")
    }

    pub fn nullifier_field(&self) -> Result<pallas::Base> {
        decode_field(&self.nullifier_hash, "nullifier_hash")
    }

    pub fn signal_field(&self) -> Result<pallas::Base> {
        decode_field(&self.signal_hash, "signal_hash")
    }

    pub fn context_field(&self) -> Result<pallas::Base> {
        decode_field(&self.context, "context")
    }

    pub fn nullifier_bytes(&self) -> Result<[u8; HASH_SIZE]> {
        decode_bytes(&self.nullifier_hash, "nullifier_hash")
    }

    pub fn context_bytes(&self) -> Result<[u8; HASH_SIZE]> {
        decode_bytes(&self.context, "context")
    }
}

/// A signal the verifier accepted, as handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedSignal {
    pub message: Vec<u8>,
    pub nullifier_hash: String,
    pub context: String,
}

/// Returned to the submitter on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalReceipt {
    pub nullifier_hash: String,
    /// Position of the signal in the accepted-signal feed.
    pub position: usize,
}

fn decode_bytes(hex_str: &str, name: &str) -> Result<[u8; HASH_SIZE]> {
    let bytes = hex::decode(hex_str)
        .with_context(|| format!("invalid {name} hex '{hex_str}'"))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        anyhow::anyhow!("{name} must be {HASH_SIZE} bytes, got {len} bytes")
    })
}

fn decode_field(hex_str: &str, name: &str) -> Result<pallas::Base> {
    let bytes = decode_bytes(hex_str, name)?;
    field_from_bytes(&bytes)
        .ok_or_else(|| anyhow::anyhow!("{name} is not a canonical field element"))
}

/// Current unix time in seconds.
///
/// # Errors
/// Fails if the system clock is before the epoch.
pub fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| anyhow::anyhow!("system clock unavailable: {e}"))
}
