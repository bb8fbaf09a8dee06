use anon_signals::{
    utils::poseidon_hash, utils::signal_hash, EpochContext, Halo2Backend, Identity,
    MembershipTree, ProvingBackend, PublicInputs, SignalProver, SignalVerifier,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pasta_curves::pallas;
use std::sync::Arc;

const BENCH_K: u32 = 6;
const BENCH_DEPTH: usize = 8;

fn bench_poseidon_hash(c: &mut Criterion) {
    let left = pallas::Base::from(1234);
    let right = pallas::Base::from(5678);

    c.bench_function("poseidon_hash_pair", |b| {
        b.iter(|| poseidon_hash(black_box(left), black_box(right)))
    });
}

fn bench_identity_derivation(c: &mut Criterion) {
    c.bench_function("identity_from_seed", |b| {
        b.iter(|| Identity::from_seed(black_box(b"benchmark seed")).unwrap())
    });
}

fn bench_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_construction");
    for size in [16usize, 64, 256] {
        let leaves: Vec<pallas::Base> =
            (0..size).map(|i| pallas::Base::from(i as u64)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &leaves, |b, leaves| {
            b.iter(|| MembershipTree::with_leaves(BENCH_DEPTH, leaves.clone()).unwrap())
        });
    }
    group.finish();
}

fn bench_membership_proof(c: &mut Criterion) {
    let leaves: Vec<pallas::Base> = (0..64).map(|i| pallas::Base::from(i as u64)).collect();
    let tree = MembershipTree::with_leaves(BENCH_DEPTH, leaves).unwrap();

    c.bench_function("membership_proof_generation", |b| {
        b.iter(|| tree.proof_for(black_box(42)).unwrap())
    });

    let proof = tree.proof_for(42).unwrap();
    let root = tree.current_root();
    c.bench_function("membership_path_verification", |b| {
        b.iter(|| MembershipTree::verify_path(black_box(&proof), black_box(root)))
    });
}

fn bench_halo2_proving(c: &mut Criterion) {
    let backend = Arc::new(Halo2Backend::new(BENCH_K).unwrap());
    let identity = Identity::from_seed(b"bench member").unwrap();
    let mut tree = MembershipTree::new(BENCH_DEPTH);
    let index = tree.insert(identity.commitment()).unwrap();
    let membership = tree.proof_for(index).unwrap();
    let context = EpochContext::new(b"bench-context");

    let prover = SignalProver::new(Arc::clone(&backend));

    c.bench_function("halo2_prove", |b| {
        b.iter(|| {
            prover
                .prove(&identity, &membership, black_box(b"bench signal"), context)
                .unwrap()
        })
    });

    let bundle = prover
        .prove(&identity, &membership, b"bench signal", context)
        .unwrap();
    let public = PublicInputs {
        merkle_root: bundle.merkle_root_field().unwrap(),
        nullifier_hash: bundle.nullifier_field().unwrap(),
        signal_hash: signal_hash(b"bench signal"),
    };

    c.bench_function("halo2_verify", |b| {
        b.iter(|| backend.verify(black_box(&bundle.proof), black_box(&public)).unwrap())
    });
}

fn bench_submission_pipeline(c: &mut Criterion) {
    let backend = Arc::new(Halo2Backend::new(BENCH_K).unwrap());
    let identity = Identity::from_seed(b"pipeline member").unwrap();
    let mut tree = MembershipTree::new(BENCH_DEPTH);
    let index = tree.insert(identity.commitment()).unwrap();
    let membership = tree.proof_for(index).unwrap();

    let prover = SignalProver::new(Arc::clone(&backend));
    let bundle = prover
        .prove(&identity, &membership, b"pipeline signal", EpochContext::new(b"bench"))
        .unwrap();

    // Fresh verifier each iteration so the nullifier ledger stays empty.
    c.bench_function("verifier_submit", |b| {
        b.iter(|| {
            let verifier = SignalVerifier::new(Arc::clone(&backend), 4);
            verifier.track_root(tree.current_root());
            verifier.submit(black_box(&bundle), b"pipeline signal").unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_poseidon_hash,
    bench_identity_derivation,
    bench_tree_construction,
    bench_membership_proof,
    bench_halo2_proving,
    bench_submission_pipeline,
);
criterion_main!(benches);
