//! The `web3` namespace.

use crate::ctx::RpcCtx;
use alloy::primitives::{keccak256, Bytes, B256};

/// Instantiate the `web3` API router.
pub fn web3() -> ajj::Router<RpcCtx> {
    ajj::Router::new().route("clientVersion", client_version).route("sha3", sha3)
}

async fn client_version(ctx: RpcCtx) -> Result<String, ()> {
    Ok(ctx.client_version())
}

async fn sha3((data,): (Bytes,)) -> Result<B256, ()> {
    Ok(keccak256(&data))
}
