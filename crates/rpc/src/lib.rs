//! Simnode RPC.
//!
//! This crate puts the JSON-RPC surface over a [`SimNode`](simnode_node::SimNode):
//! an `eth` namespace implementing the standard wallet- and dapp-facing
//! methods, an `evm` namespace for development-only mining controls, and the
//! `net`/`web3` helpers clients probe on connect. Push subscriptions ride the
//! node's notification channels and are delivered over the WS listener.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use simnode_node::{NodeConfig, SimNode};
//! use simnode_rpc::{router, RpcCtx, ServeConfig};
//!
//! # pub async fn f() -> eyre::Result<()> {
//! let node = SimNode::new(NodeConfig::default())?;
//! let router = router().with_state(RpcCtx::new(node));
//!
//! let cfg = ServeConfig {
//!     http: vec!["127.0.0.1:8545".parse()?],
//!     http_cors: None,
//!     ws: vec!["127.0.0.1:8546".parse()?],
//!     ws_cors: None,
//! };
//!
//! // The guard shuts the servers down when dropped.
//! let guard = cfg.serve(router).await?;
//! # Ok(())
//! # }
//! ```

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
pub use config::{RpcServerGuard, ServeConfig};

mod ctx;
pub use ctx::RpcCtx;

mod eth;
pub use eth::{eth, EthError};

mod evm;
pub use evm::evm;

mod net;
pub use net::net;

mod subs;
pub use subs::SubscriptionManager;

mod web3;
pub use web3::web3;

pub(crate) mod util;

/// Re-exported for convenience.
pub use ::ajj;

use ajj::Router;

/// Create a router over every namespace the node serves.
pub fn router() -> Router<RpcCtx> {
    Router::new()
        .nest("eth", eth())
        .nest("evm", evm())
        .nest("net", net())
        .nest("web3", web3())
}
