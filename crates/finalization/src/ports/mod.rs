//! Ports module for the finalization core

pub mod inbound;
pub mod outbound;

pub use inbound::FinalizationApi;
pub use outbound::{BlockSource, ChainView, Coin, CoinView, MempoolView, SignatureChecker};
