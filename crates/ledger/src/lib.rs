//! Simnode ledger.
//!
//! This crate provides the in-memory chain index backing a simnode instance:
//! mined blocks, their transactions and receipts, cumulative difficulty, and
//! bloom-accelerated log queries over block ranges.
//!
//! The ledger is deliberately not thread-safe; the node serializes all
//! mutations behind a single lock (mining, reverts) and hands out cheap
//! `Arc` clones of immutable blocks and receipts for reads.

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

mod block;
pub use block::{MinedBlock, MinedReceipt};

mod error;
pub use error::LedgerError;

mod filter;
pub use filter::{filter_logs, LogCriteria};

mod index;
pub use index::{LedgerConfig, LedgerIndex};

mod util;
pub use util::BlockRangeInclusiveIter;
