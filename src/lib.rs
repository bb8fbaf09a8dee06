//! Anonymous group signaling with zero-knowledge membership proofs.
//!
//! A member of a fixed, publicly known group publishes a message (a
//! "signal") such that verifiers can confirm the author is a group member
//! without learning which one, while no member can publish more than one
//! signal per context.
//!
//! # Components
//!
//! - [`Identity`]: private (trapdoor, nullifier secret) pair and its public
//!   Poseidon commitment
//! - [`MembershipTree`]: fixed-depth append-only Merkle tree over
//!   commitments, with sibling-path proof generation
//! - [`SignalProver`]: turns an identity, a membership proof, and a message
//!   into a [`ProofBundle`] via a [`ProvingBackend`]
//! - [`SignalVerifier`]: the accept/reject state machine with a trusted-root
//!   window and an atomic nullifier ledger
//! - [`Halo2Backend`]: the default halo2/Pallas proving backend
//!
//! # Example
//!
//! ```no_run
//! use anon_signals::{Halo2Backend, Identity, MembershipTree, CIRCUIT_K, TREE_DEPTH};
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod identity;
pub mod merkle;
pub mod prover;
pub mod types;
pub mod utils;
pub mod verifier;


pub use circuit::{Halo2Backend, ProvingBackend, PublicInputs, SignalCircuit, SignalWitness};
pub use config::Config;
pub use error::SignalError;
pub use identity::Identity;
pub use merkle::{MembershipProof, MembershipTree};
pub use prover::SignalProver;
pub use types::{AcceptedSignal, EpochContext, ProofBundle, SignalReceipt};
pub use verifier::{NullifierLedger, RootHistory, SignalFeed, SignalVerifier};

/// Circuit parameter for the halo2 proving system.
///
/// The value `k = 12` creates a circuit with 2^k = 4096 rows, comfortably
/// holding the witness for the default tree depth.
///
/// # Security Considerations
///
/// Changing `CIRCUIT_K` requires regenerating all proving and verifying
/// keys. Prover and verifier must use the same value, or verification will
/// fail.
pub const CIRCUIT_K: u32 = 12;

/// Default membership tree depth: capacity 2^20 commitments.
///
/// All members of one group must build proofs against a tree of the same
/// depth; the sibling path length is part of the statement.
pub const TREE_DEPTH: usize = 20;
