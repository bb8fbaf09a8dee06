//! Identity derivation for anonymous group membership.
//!
//! An identity is a pair of secret field elements: a trapdoor and a
//! nullifier secret. Only the Poseidon commitment over the pair ever leaves
//! the holder; the secrets stay inside this process. The commitment is what
//! gets inserted into the membership tree.

use crate::error::SignalError;
use crate::utils::{hash_to_field, poseidon_hash};
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use rand::RngCore;

const TRAPDOOR_DOMAIN: &[u8] = b"anon-signals:trapdoor";
const NULLIFIER_DOMAIN: &[u8] = b"anon-signals:nullifier";

/// A member's private identity.
///
/// Deliberately does not implement `Debug` or `Serialize`; the secrets are
/// not meant to be printed or transmitted.
#[derive(Clone)]
pub struct Identity {
    trapdoor: pallas::Base,
    nullifier_secret: pallas::Base,
}

impl Identity {
    /// Derives an identity deterministically from a seed.
    ///
    /// The seed is typically a user-signed message supplied by a wallet.
    /// Trapdoor and nullifier secret are absorbed under independent domain
    /// tags, so knowledge of one reveals nothing about the other. The same
    /// seed always yields the same identity.
    ///
    /// # Errors
    /// Fails with [`SignalError::InvalidSeed`] if the seed is empty.
    pub fn from_seed(seed: &[u8]) -> Result<Self, SignalError> {
        if seed.is_empty() {
            return Err(SignalError::InvalidSeed(
                "seed must not be empty".to_string(),
            ));
        }

        Ok(Self {
            trapdoor: hash_to_field(TRAPDOOR_DOMAIN, seed),
            nullifier_secret: hash_to_field(NULLIFIER_DOMAIN, seed),
        })
    }

    /// Samples a fresh random identity. Used by tooling and tests.
    pub fn random(mut rng: impl RngCore) -> Self {
        Self {
            trapdoor: pallas::Base::random(&mut rng),
            nullifier_secret: pallas::Base::random(&mut rng),
        }
    }

    /// The public commitment `Poseidon(trapdoor, nullifier_secret)`.
    ///
    /// Pure and stable: the same identity always yields the same commitment,
    /// computed with the exact hash and field used by the membership tree.
    #[must_use]
    pub fn commitment(&self) -> pallas::Base {
        poseidon_hash(self.trapdoor, self.nullifier_secret)
    }

    pub(crate) fn trapdoor(&self) -> pallas::Base {
        self.trapdoor
    }

    pub(crate) fn nullifier_secret(&self) -> pallas::Base {
        self.nullifier_secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_is_deterministic() {
        let a = Identity::from_seed(b"signed message").unwrap();
        let b = Identity::from_seed(b"signed message").unwrap();
        assert_eq!(a.commitment(), b.commitment());
        // Stable across repeated calls on the same identity.
        assert_eq!(a.commitment(), a.commitment());
    }

    #[test]
    fn test_distinct_seeds_distinct_commitments() {
        let a = Identity::from_seed(b"seed one").unwrap();
        let b = Identity::from_seed(b"seed two").unwrap();
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn test_empty_seed_rejected() {
        let result = Identity::from_seed(b"");
        assert!(matches!(result, Err(SignalError::InvalidSeed(_))));
    }

    #[test]
    fn test_trapdoor_independent_of_nullifier_secret() {
        let identity = Identity::from_seed(b"some seed").unwrap();
        assert_ne!(identity.trapdoor(), identity.nullifier_secret());
    }

    #[test]
    fn test_random_identities_differ() {
        let a = Identity::random(rand::thread_rng());
        let b = Identity::random(rand::thread_rng());
        assert_ne!(a.commitment(), b.commitment());
    }
}
