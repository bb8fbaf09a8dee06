//! Error taxonomy for the signaling pipeline.
//!
//! Every operation in the crate fails with exactly one of these variants.
//! All of them are terminal for the operation that raised them; only
//! [`SignalError::ProvingBackend`] is worth retrying (transient backend
//! failure). `InvalidProof` and `DuplicateNullifier` are never retried:
//! a cryptographic or replay outcome does not change on a second attempt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    /// The identity seed could not be mapped into the field.
    #[error("invalid identity seed: {0}")]
    InvalidSeed(String),

    /// The membership tree has no free leaf slots left.
    #[error("membership tree is full (depth {depth}, capacity {capacity})")]
    TreeFull { depth: usize, capacity: usize },

    /// The requested leaf index is unused or out of range.
    #[error("no leaf at index {index} (tree has {leaf_count} leaves)")]
    UnknownLeaf { index: usize, leaf_count: usize },

    /// The membership proof references a root the prover's policy rejects.
    #[error("membership proof root does not match the pinned root")]
    StaleProof,

    /// The proving backend failed: malformed witness, resource exhaustion,
    /// or a timeout.
    #[error("proving backend failure: {0}")]
    ProvingBackend(String),

    /// The submitted merkle root is outside the trusted root window.
    #[error("merkle root is not in the trusted root window")]
    UnknownRoot,

    /// The proof failed cryptographic verification, or the bundle is
    /// structurally unsound.
    #[error("proof failed verification")]
    InvalidProof,

    /// The nullifier was already recorded for this context.
    #[error("nullifier already recorded for this context")]
    DuplicateNullifier,
}
