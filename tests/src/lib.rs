//! # FFG Finalization Test Suite
//!
//! End-to-end scenarios driving [`ffg_finalization::FinalizationService`]
//! over an in-memory chain with real secp256k1 vote signatures.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks
//! └── src/
//!     ├── fixtures.rs   # Network harness, finalizer keys, commit builders
//!     └── integration/  # Scenarios
//!         ├── finality_flow.rs
//!         ├── slashing.rs
//!         ├── withdrawal.rs
//!         ├── permissioning.rs
//!         └── repository.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ffg-tests
//!
//! # By scenario
//! cargo test -p ffg-tests integration::slashing::
//!
//! # With logs
//! RUST_LOG=ffg_finalization=debug cargo test -p ffg-tests -- --nocapture
//!
//! # Benchmarks
//! cargo bench -p ffg-tests
//! ```

#![allow(unused_variables)]
#![allow(dead_code)]
