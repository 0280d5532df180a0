//! Development-only mining and snapshot controls.

use crate::{ctx::RpcCtx, util::await_jh_option};
use ajj::HandlerCtx;
use alloy::primitives::U64;

/// Instantiate the `evm` API router.
pub fn evm() -> ajj::Router<RpcCtx> {
    ajj::Router::new()
        .route("snapshot", snapshot)
        .route("revert", revert)
        .route("mine", mine)
        .route("setAutomine", set_automine)
}

async fn snapshot(hctx: HandlerCtx, ctx: RpcCtx) -> Result<U64, String> {
    let task = async move { Ok(U64::from(ctx.node().snapshot())) };

    await_jh_option!(hctx.spawn_blocking(task))
}

async fn revert(hctx: HandlerCtx, (id,): (U64,), ctx: RpcCtx) -> Result<bool, String> {
    let task = async move { Ok(ctx.node().revert_to_snapshot(id.to::<u64>())) };

    await_jh_option!(hctx.spawn_blocking(task))
}

/// Mines one block immediately, pending pool included, and returns its number.
async fn mine(hctx: HandlerCtx, ctx: RpcCtx) -> Result<U64, String> {
    let task = async move { Ok(U64::from(ctx.node().mine_block().number())) };

    await_jh_option!(hctx.spawn_blocking(task))
}

async fn set_automine(hctx: HandlerCtx, (automine,): (bool,), ctx: RpcCtx) -> Result<bool, String> {
    let task = async move {
        ctx.node().set_automine(automine);
        Ok(true)
    };

    await_jh_option!(hctx.spawn_blocking(task))
}
