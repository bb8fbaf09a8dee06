//! Proof bundle generation.
//!
//! The prover glues the identity, a membership proof, and a message into a
//! call to the proving backend, then packages the opaque proof with its
//! public outputs. It validates the witness natively before spending any
//! time in the backend: a sibling path that does not reconstruct the claimed
//! root can never yield an acceptable proof.

use crate::circuit::{ProvingBackend, PublicInputs, SignalWitness};
use crate::error::SignalError;
use crate::identity::Identity;
use crate::merkle::{MembershipProof, MembershipTree};
use crate::types::{unix_now, EpochContext, ProofBundle};
use crate::utils::{field_to_bytes, poseidon_hash, signal_hash};
use log::{debug, info};
use pasta_curves::pallas;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Generates proof bundles against a shared proving backend.
pub struct SignalProver<B> {
    backend: Arc<B>,
    timeout: Option<Duration>,
    pinned_root: Option<pallas::Base>,
}

impl<B> SignalProver<B>
where
    B: ProvingBackend + Send + Sync + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            timeout: None,
            pinned_root: None,
        }
    }

    /// Bounds each backend invocation. On expiry the prover fails with
    /// [`SignalError::ProvingBackend`] instead of blocking indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enforces that membership proofs reference exactly this root.
    ///
    /// Root-staleness policy belongs to the verifier; pinning is for callers
    /// that want to fail fast with [`SignalError::StaleProof`] before proving
    /// against a root the verifier will reject anyway.
    #[must_use]
    pub fn with_pinned_root(mut self, root: pallas::Base) -> Self {
        self.pinned_root = Some(root);
        self
    }

    /// Produces a proof bundle for `message` under `context`.
    ///
    /// Computes `nullifier_hash = Poseidon(context, nullifier_secret)` and
    /// `signal_hash` over the message, then hands the secrets and sibling
    /// path to the backend with the public inputs
    /// `{merkle_root, nullifier_hash, signal_hash}`.
    ///
    /// # Errors
    /// - [`SignalError::ProvingBackend`] for a malformed witness (leaf not
    ///   the identity's commitment, or a path that does not reconstruct the
    ///   root), a backend failure, or a timeout.
    /// - [`SignalError::StaleProof`] if a pinned root is set and the
    ///   membership proof references a different one.
    pub fn prove(
        &self,
        identity: &Identity,
        membership: &MembershipProof,
        message: &[u8],
        context: EpochContext,
    ) -> Result<ProofBundle, SignalError> {
        if membership.leaf != identity.commitment() {
            return Err(SignalError::ProvingBackend(
                "membership proof leaf does not match the identity commitment".to_string(),
            ));
        }
        if !MembershipTree::verify_path(membership, membership.root) {
            return Err(SignalError::ProvingBackend(
                "sibling path does not reconstruct the claimed root".to_string(),
            ));
        }
        if let Some(pinned) = self.pinned_root {
            if membership.root != pinned {
                return Err(SignalError::StaleProof);
            }
        }

        let nullifier_hash = poseidon_hash(context.to_field(), identity.nullifier_secret());
        let signal = signal_hash(message);
        let public = PublicInputs {
            merkle_root: membership.root,
            nullifier_hash,
            signal_hash: signal,
        };
        let witness = SignalWitness {
            trapdoor: identity.trapdoor(),
            nullifier_secret: identity.nullifier_secret(),
            siblings: membership.siblings.clone(),
            path_indices: membership.path_indices.clone(),
        };

        debug!(
            "proving signal: leaf_index={}, depth={}",
            membership.leaf_index,
            membership.siblings.len()
        );
        let proof = self.run_backend(witness, public)?;
        info!("signal proof generated: {} bytes", proof.len());

        Ok(ProofBundle {
            merkle_root: hex::encode(field_to_bytes(public.merkle_root)),
            nullifier_hash: hex::encode(field_to_bytes(public.nullifier_hash)),
            signal_hash: hex::encode(field_to_bytes(public.signal_hash)),
            context: context.to_hex(),
            proof,
            timestamp: unix_now()
                .map_err(|e| SignalError::ProvingBackend(e.to_string()))?,
        })
    }

    fn run_backend(
        &self,
        witness: SignalWitness,
        public: PublicInputs,
    ) -> Result<Vec<u8>, SignalError> {
        let Some(limit) = self.timeout else {
            return self.backend.prove(&witness, &public);
        };

        // The worker is detached on timeout; proving is pure, so an
        // abandoned run holds no locks and its result is simply dropped.
        let backend = Arc::clone(&self.backend);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(backend.prove(&witness, &public));
        });

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(_) => Err(SignalError::ProvingBackend(format!(
                "proving backend timed out after {}s",
                limit.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MembershipTree;

    /// Backend stub: proof bytes are a hash of the public inputs, so
    /// completeness and public-input binding hold without a real circuit.
    struct StubBackend {
        delay: Option<Duration>,
    }

    impl StubBackend {
        fn digest(public: &PublicInputs) -> Vec<u8> {
            use sha3::{Digest, Sha3_256};
            let mut hasher = Sha3_256::new();
            for value in public.to_vec() {
                hasher.update(field_to_bytes(value));
            }
            hasher.finalize().to_vec()
        }
    }

    impl ProvingBackend for StubBackend {
        fn prove(
            &self,
            _witness: &SignalWitness,
            public: &PublicInputs,
        ) -> Result<Vec<u8>, SignalError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            Ok(Self::digest(public))
        }

        fn verify(&self, proof: &[u8], public: &PublicInputs) -> Result<bool, SignalError> {
            Ok(proof == Self::digest(public))
        }
    }

    fn setup() -> (Identity, MembershipTree, MembershipProof) {
        let identity = Identity::from_seed(b"prover test seed").unwrap();
        let mut tree = MembershipTree::new(4);
        let index = tree.insert(identity.commitment()).unwrap();
        let proof = tree.proof_for(index).unwrap();
        (identity, tree, proof)
    }

    #[test]
    fn test_prove_produces_consistent_bundle() {
        let (identity, tree, membership) = setup();
        let prover = SignalProver::new(Arc::new(StubBackend { delay: None }));

        let bundle = prover
            .prove(&identity, &membership, b"hello", EpochContext::new(b"poll-1"))
            .unwrap();

        assert_eq!(
            bundle.merkle_root,
            hex::encode(field_to_bytes(tree.current_root()))
        );
        assert_eq!(
            bundle.signal_hash,
            hex::encode(field_to_bytes(signal_hash(b"hello")))
        );
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_nullifier_deterministic_per_context() {
        let (identity, _, membership) = setup();
        let prover = SignalProver::new(Arc::new(StubBackend { delay: None }));

        let a = prover
            .prove(&identity, &membership, b"one", EpochContext::new(b"poll-1"))
            .unwrap();
        let b = prover
            .prove(&identity, &membership, b"two", EpochContext::new(b"poll-1"))
            .unwrap();
        let c = prover
            .prove(&identity, &membership, b"one", EpochContext::new(b"poll-2"))
            .unwrap();

        // Same identity and context: same nullifier, regardless of message.
        assert_eq!(a.nullifier_hash, b.nullifier_hash);
        // Different context: different nullifier.
        assert_ne!(a.nullifier_hash, c.nullifier_hash);
    }

    #[test]
    fn test_foreign_membership_proof_rejected() {
        let (identity, _, _) = setup();
        let other = Identity::from_seed(b"someone else").unwrap();
        let mut tree = MembershipTree::new(4);
        let index = tree.insert(other.commitment()).unwrap();
        let membership = tree.proof_for(index).unwrap();

        let prover = SignalProver::new(Arc::new(StubBackend { delay: None }));
        let result = prover.prove(&identity, &membership, b"hi", EpochContext::new(b"poll-1"));
        assert!(matches!(result, Err(SignalError::ProvingBackend(_))));
    }

    #[test]
    fn test_tampered_path_rejected_before_backend() {
        let (identity, _, mut membership) = setup();
        membership.siblings[0] = pallas::Base::from(0xBAD);

        let prover = SignalProver::new(Arc::new(StubBackend { delay: None }));
        let result = prover.prove(&identity, &membership, b"hi", EpochContext::new(b"poll-1"));
        assert!(matches!(result, Err(SignalError::ProvingBackend(_))));
    }

    #[test]
    fn test_pinned_root_mismatch_is_stale() {
        let (identity, _, membership) = setup();
        let prover = SignalProver::new(Arc::new(StubBackend { delay: None }))
            .with_pinned_root(pallas::Base::from(42));

        let result = prover.prove(&identity, &membership, b"hi", EpochContext::new(b"poll-1"));
        assert!(matches!(result, Err(SignalError::StaleProof)));
    }

    #[test]
    fn test_timeout_fails_instead_of_blocking() {
        let (identity, _, membership) = setup();
        let prover = SignalProver::new(Arc::new(StubBackend {
            delay: Some(Duration::from_secs(5)),
        }))
        .with_timeout(Duration::from_millis(50));

        let result = prover.prove(&identity, &membership, b"hi", EpochContext::new(b"poll-1"));
        match result {
            Err(SignalError::ProvingBackend(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout error, got {other:?}"),
        }
    }
}
