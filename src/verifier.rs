//! The verification state machine, trusted-root window, nullifier ledger,
//! and accepted-signal feed.
//!
//! Each submission walks
//! `Received -> RootChecked -> ProofChecked -> NullifierChecked -> Accepted`
//! and any failed stage rejects with the taxonomy error for that stage,
//! leaving the ledger and root window untouched. The nullifier
//! check-then-record step runs inside a single critical section, so exactly
//! one submission with a given nullifier can ever be accepted, even under
//! concurrent `submit` calls.

use crate::circuit::{ProvingBackend, PublicInputs};
use crate::error::SignalError;
use crate::types::{AcceptedSignal, ProofBundle, SignalReceipt, HASH_SIZE};
use crate::utils::signal_hash;
use log::{debug, info, warn};
use pasta_curves::pallas;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Stages of the per-submission state machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    RootChecked,
    ProofChecked,
    NullifierChecked,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "Received",
            Stage::RootChecked => "RootChecked",
            Stage::ProofChecked => "ProofChecked",
            Stage::NullifierChecked => "NullifierChecked",
        };
        f.write_str(name)
    }
}

/// A poison-tolerant lock: a panicked writer cannot have left these
/// structures half-updated (every mutation is a single push/insert), so we
/// take the data as-is rather than propagating the poison.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bounded window of trusted Merkle roots.
///
/// Proof generation races tree growth; a window of recent roots absorbs that
/// race without a global lock across the two subsystems. The window length
/// is policy, configured by the application, never hard-coded to "latest
/// only".
#[derive(Debug)]
pub struct RootHistory {
    window: usize,
    roots: Mutex<VecDeque<pallas::Base>>,
}

impl RootHistory {
    /// Creates a window holding the most recent `window` roots (at least 1).
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            roots: Mutex::new(VecDeque::new()),
        }
    }

    /// Records a new trusted root, evicting the oldest beyond the window.
    ///
    /// Re-tracking a root already in the window is a no-op; the scan is over
    /// at most `window` entries.
    pub fn track(&self, root: pallas::Base) {
        let mut roots = lock(&self.roots);
        if roots.contains(&root) {
            return;
        }
        roots.push_back(root);
        while roots.len() > self.window {
            roots.pop_front();
        }
    }

    #[must_use]
    pub fn is_trusted(&self, root: &pallas::Base) -> bool {
        lock(&self.roots).contains(root)
    }

    #[must_use]
    pub fn latest(&self) -> Option<pallas::Base> {
        lock(&self.roots).back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.roots).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.roots).is_empty()
    }
}

/// Monotonic set of accepted nullifiers, scoped per context.
///
/// The check-then-record step is the classic compare-and-set race; it runs
/// as one atomic operation under a single lock.
#[derive(Debug, Default)]
pub struct NullifierLedger {
    seen: Mutex<HashMap<[u8; HASH_SIZE], HashSet<[u8; HASH_SIZE]>>>,
}

impl NullifierLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically records the nullifier unless it is already present.
    ///
    /// Returns `false` if the nullifier was seen before in this context.
    pub fn try_record(&self, context: &[u8; HASH_SIZE], nullifier: &[u8; HASH_SIZE]) -> bool {
        lock(&self.seen)
            .entry(*context)
            .or_default()
            .insert(*nullifier)
    }

    #[must_use]
    pub fn contains(&self, context: &[u8; HASH_SIZE], nullifier: &[u8; HASH_SIZE]) -> bool {
        lock(&self.seen)
            .get(context)
            .is_some_and(|set| set.contains(nullifier))
    }

    /// Seeds the ledger from persisted state, e.g. a nullifier file loaded
    /// at startup.
    pub fn preload(
        &self,
        context: &[u8; HASH_SIZE],
        nullifiers: impl IntoIterator<Item = [u8; HASH_SIZE]>,
    ) {
        lock(&self.seen)
            .entry(*context)
            .or_default()
            .extend(nullifiers);
    }

    #[must_use]
    pub fn count(&self, context: &[u8; HASH_SIZE]) -> usize {
        lock(&self.seen).get(context).map_or(0, HashSet::len)
    }
}

/// Ordered feed of accepted signals: the in-process face of the relay.
///
/// One feed per verifier, created at initialization and torn down with it;
/// reads are idempotent snapshots and rejected submissions never appear.
#[derive(Debug, Default)]
pub struct SignalFeed {
    accepted: Mutex<Vec<AcceptedSignal>>,
}

impl SignalFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, signal: AcceptedSignal) -> usize {
        let mut accepted = lock(&self.accepted);
        accepted.push(signal);
        accepted.len() - 1
    }

    /// The accepted signals in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AcceptedSignal> {
        lock(&self.accepted).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.accepted).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.accepted).is_empty()
    }
}

/// Verifies proof bundles and enforces one signal per (identity, context).
pub struct SignalVerifier<B> {
    backend: Arc<B>,
    roots: RootHistory,
    ledger: NullifierLedger,
    feed: SignalFeed,
    timestamp_tolerance_secs: u64,
    timestamp_max_age_secs: u64,
}

impl<B: ProvingBackend> SignalVerifier<B> {
    /// Creates a verifier trusting the most recent `root_window` roots.
    pub fn new(backend: Arc<B>, root_window: usize) -> Self {
        Self {
            backend,
            roots: RootHistory::new(root_window),
            ledger: NullifierLedger::new(),
            feed: SignalFeed::new(),
            timestamp_tolerance_secs: ProofBundle::TIMESTAMP_TOLERANCE_SECS,
            timestamp_max_age_secs: ProofBundle::TIMESTAMP_MAX_AGE_SECS,
        }
    }

    /// Overrides the timestamp policy applied during structural validation.
    #[must_use]
    pub fn with_timestamp_limits(mut self, tolerance_secs: u64, max_age_secs: u64) -> Self {
        self.timestamp_tolerance_secs = tolerance_secs;
        self.timestamp_max_age_secs = max_age_secs;
        self
    }

    /// Advances the trusted-root window as the membership tree grows.
    pub fn track_root(&self, root: pallas::Base) {
        self.roots.track(root);
    }

    /// Runs one submission through the state machine.
    ///
    /// `message` is the raw signal content; its hash must match the bundle's
    /// `signal_hash`, which is what binds the proof to this exact message.
    ///
    /// On acceptance the nullifier is recorded and the signal appended to
    /// the feed; on any rejection no state changes.
    ///
    /// # Errors
    /// - [`SignalError::UnknownRoot`] if the bundle's root is outside the
    ///   trusted window.
    /// - [`SignalError::InvalidProof`] for structural defects, a message
    ///   that does not match `signal_hash`, or cryptographic failure.
    /// - [`SignalError::DuplicateNullifier`] if the nullifier was already
    ///   accepted in this context.
    pub fn submit(
        &self,
        bundle: &ProofBundle,
        message: &[u8],
    ) -> Result<SignalReceipt, SignalError> {
        debug!("submission {}: {}", &bundle.nullifier_hash, Stage::Received);

        if let Err(reason) =
            bundle.validate_with(self.timestamp_tolerance_secs, self.timestamp_max_age_secs)
        {
            warn!("rejecting structurally invalid bundle: {reason:#}");
            return Err(SignalError::InvalidProof);
        }

        // validate() guarantees these decode.
        let merkle_root = bundle
            .merkle_root_field()
            .map_err(|_| SignalError::InvalidProof)?;
        let nullifier_hash = bundle
            .nullifier_field()
            .map_err(|_| SignalError::InvalidProof)?;
        let claimed_signal = bundle
            .signal_field()
            .map_err(|_| SignalError::InvalidProof)?;
        let context_key = bundle
            .context_bytes()
            .map_err(|_| SignalError::InvalidProof)?;
        let nullifier_key = bundle
            .nullifier_bytes()
            .map_err(|_| SignalError::InvalidProof)?;

        if !self.roots.is_trusted(&merkle_root) {
            debug!("rejecting at {}: untrusted root", Stage::RootChecked);
            return Err(SignalError::UnknownRoot);
        }
        debug!("submission {}: {}", &bundle.nullifier_hash, Stage::RootChecked);

        if signal_hash(message) != claimed_signal {
            warn!("rejecting: message does not match signal hash");
            return Err(SignalError::InvalidProof);
        }

        let public = PublicInputs {
            merkle_root,
            nullifier_hash,
            signal_hash: claimed_signal,
        };
        match self.backend.verify(&bundle.proof, &public) {
            Ok(true) => {}
            Ok(false) => {
                debug!("rejecting at {}: proof invalid", Stage::ProofChecked);
                return Err(SignalError::InvalidProof);
            }
            Err(e) => {
                warn!("rejecting at {}: backend error: {e}", Stage::ProofChecked);
                return Err(SignalError::InvalidProof);
            }
        }
        debug!("submission {}: {}", &bundle.nullifier_hash, Stage::ProofChecked);

        // Atomic check-then-record: the only serialization point shared by
        // concurrent submissions.
        if !self.ledger.try_record(&context_key, &nullifier_key) {
            debug!(
                "rejecting at {}: duplicate nullifier",
                Stage::NullifierChecked
            );
            return Err(SignalError::DuplicateNullifier);
        }
        debug!(
            "submission {}: {}",
            &bundle.nullifier_hash,
            Stage::NullifierChecked
        );

        let position = self.feed.record(AcceptedSignal {
            message: message.to_vec(),
            nullifier_hash: bundle.nullifier_hash.clone(),
            context: bundle.context.clone(),
        });
        info!(
            "signal accepted: nullifier={} position={position}",
            &bundle.nullifier_hash
        );

        Ok(SignalReceipt {
            nullifier_hash: bundle.nullifier_hash.clone(),
            position,
        })
    }

    #[must_use]
    pub fn feed(&self) -> &SignalFeed {
        &self.feed
    }

    #[must_use]
    pub fn ledger(&self) -> &NullifierLedger {
        &self.ledger
    }

    #[must_use]
    pub fn roots(&self) -> &RootHistory {
        &self.roots
    }
}
