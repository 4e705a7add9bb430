//! # Finalization Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Epochs | Deriving states across empty blocks |
//! | Votes | Vote signature verification |
//! | Commits | Structural decoding of vote commits |
//! | Repository | Tip processing through the service |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ffg_finalization::adapters::Secp256k1SignatureChecker;
use ffg_finalization::ports::SignatureChecker;
use ffg_finalization::{check_finalizer_commit, AdminParams, FinalizationState, Vote};
use ffg_tests::fixtures::{signer, test_params, vote_tx, Finalizer, Network};
use shared_types::{BlockHandle, BlockIndex, Height};
use std::time::Duration;

fn index(height: Height) -> BlockIndex {
    BlockIndex {
        handle: BlockHandle(height),
        parent: height.checked_sub(1).map(BlockHandle),
        height,
        hash: [height as u8; 32],
    }
}

// ============================================================================
// Epoch transitions
// ============================================================================

fn bench_state_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("state-derivation");
    let genesis = FinalizationState::new(test_params(), &AdminParams::default());

    for blocks in [5u32, 50, 250] {
        group.throughput(Throughput::Elements(u64::from(blocks)));
        group.bench_with_input(BenchmarkId::new("empty_blocks", blocks), &blocks, |b, &blocks| {
            b.iter(|| {
                let mut state = genesis.clone();
                for height in 1..=blocks {
                    let mut child = state.derive_child();
                    child.process_new_tip(&index(height), &[], &Secp256k1SignatureChecker).unwrap();
                    state = child;
                }
                black_box(state.last_finalized_epoch())
            })
        });
    }
    group.finish();
}

// ============================================================================
// Vote signatures
// ============================================================================

fn bench_vote_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("vote-signatures");
    group.measurement_time(Duration::from_secs(10));

    let signer = signer(1);
    let pubkey = signer.public_key();
    let vote = Vote::new(pubkey.address(), [7; 32], 3, 4);
    let record = signer.sign_vote(vote);
    let checker = Secp256k1SignatureChecker::new();
    let message_hash = vote.signing_hash();

    group.bench_function("sign_vote", |b| b.iter(|| black_box(signer.sign_vote(vote))));
    group.bench_function("verify_vote", |b| {
        b.iter(|| black_box(checker.verify(&pubkey, &message_hash, &record.signature)))
    });

    let finalizer = Finalizer::new(1);
    let tx = vote_tx(&signer, &finalizer.deposit(), vote);
    group.bench_function("check_vote_commit", |b| {
        b.iter(|| black_box(check_finalizer_commit(&tx, &checker).is_ok()))
    });
    group.finish();
}

// ============================================================================
// Tip processing
// ============================================================================

fn bench_tip_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("tip-processing");
    group.sample_size(20);

    group.bench_function("mine_100_blocks", |b| {
        b.iter(|| {
            let network = Network::permissionless();
            network.mine_until(100);
            black_box(network.service.repository_len())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_state_derivation,
    bench_vote_signatures,
    bench_tip_processing
);
criterion_main!(benches);
