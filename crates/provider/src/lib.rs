//! Simnode provider.
//!
//! A provider is a base [`Transport`] (HTTP, or the in-process node) wrapped
//! in an ordered stack of request interceptors. Each layer implements
//! intercept-or-forward: inspect the request, optionally rewrite its
//! parameters, hand it to the next layer, optionally post-process the
//! response.
//!
//! The standard stack for an HTTP-backed network, outermost first:
//! local signing, sender resolution, gas-limit filling, fee-price filling,
//! chain-id validation, transport. [`ProviderBuilder`] composes it.

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

mod builder;
pub use builder::ProviderBuilder;

mod error;
pub use error::{ProviderError, Result};

mod keystore;
pub use keystore::{AccountKeyStore, DERIVATION_PATH_PREFIX};

pub mod layers;

mod request;
pub use request::{
    is_transaction_method, parse_net_version, parse_quantity, read_tx_request, to_quantity,
    write_tx_request,
};

mod transport;
pub use transport::{BoxTransport, HttpTransport, Transport};

#[cfg(test)]
pub(crate) mod mock;
