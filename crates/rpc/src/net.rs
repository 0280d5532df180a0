//! The `net` namespace: connectivity probes clients issue on connect.

use crate::ctx::RpcCtx;
use alloy::primitives::U64;

/// Instantiate the `net` API router.
pub fn net() -> ajj::Router<RpcCtx> {
    ajj::Router::new()
        .route("version", version)
        .route("listening", listening)
        .route("peerCount", peer_count)
}

/// The chain id, as a decimal string.
async fn version(ctx: RpcCtx) -> Result<String, ()> {
    Ok(ctx.node().chain_id().to_string())
}

async fn listening() -> Result<bool, ()> {
    Ok(true)
}

async fn peer_count() -> Result<U64, ()> {
    Ok(U64::ZERO)
}
