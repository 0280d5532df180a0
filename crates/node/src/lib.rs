//! Simnode node core.
//!
//! A [`SimNode`] owns the chain: the ledger index, a pluggable execution
//! engine, the pending-transaction pool, snapshots, the filter registry and
//! the chain notification channel. All state-mutating operations (mining,
//! reverts) are serialized behind a single lock; readers get cheap `Arc`
//! clones of immutable blocks and receipts.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]

mod config;
pub use config::NodeConfig;

mod engine;
pub use engine::{AccountState, ExecutionEngine, ExecutionOutcome, TransferEngine};

mod error;
pub use error::{NodeError, Result};

mod filters;
pub use filters::{FilterOutput, FilterRegistry, InterestKind};

mod hardfork;
pub use hardfork::Hardfork;

mod node;
pub use node::{BlockRef, SimNode};

mod notify;
pub use notify::ChainNotification;
