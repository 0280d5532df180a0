use crate::{ctx::RpcCtx, eth::EthError, util::await_jh_option};
use ajj::{HandlerCtx, ResponsePayload};
use alloy::{
    dyn_abi::TypedData,
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, Bytes, B256, U256, U64},
    rpc::types::{
        pubsub::SubscriptionKind, Block, FeeHistory, Filter, Log, Transaction,
        TransactionReceipt, TransactionRequest,
    },
};
use serde::Deserialize;
use simnode_ledger::LogCriteria;
use simnode_node::{FilterOutput, InterestKind};
use std::borrow::Cow;

/// Args for `eth_estimateGas` and `eth_call`.
#[derive(Debug, Deserialize)]
pub(super) struct TxParams(TransactionRequest, #[serde(default)] Option<BlockId>);

/// Args for `eth_getBlockByHash` and `eth_getBlockByNumber`.
#[derive(Debug, Deserialize)]
pub(super) struct BlockParams<T>(T, #[serde(default)] Option<bool>);

/// Args for `eth_feeHistory`.
#[derive(Debug, Deserialize)]
pub(super) struct FeeHistoryArgs(U64, BlockNumberOrTag, #[serde(default)] Option<Vec<f64>>);

/// Args for `eth_getStorageAt`.
#[derive(Debug, Deserialize)]
pub(super) struct StorageAtArgs(Address, U256, #[serde(default)] Option<BlockId>);

/// Args for `eth_getBalance`, `eth_getTransactionCount`, and `eth_getCode`.
#[derive(Debug, Deserialize)]
pub(super) struct AddrWithBlock(Address, #[serde(default)] Option<BlockId>);

/// Args for `eth_sign`.
#[derive(Debug, Deserialize)]
pub(super) struct SignArgs(Address, Bytes);

/// Args for `eth_subscribe`.
#[derive(Debug, Deserialize)]
pub struct SubscribeArgs(pub SubscriptionKind, #[serde(default)] pub Option<Box<Filter>>);

impl TryFrom<SubscribeArgs> for InterestKind {
    type Error = String;

    fn try_from(args: SubscribeArgs) -> Result<Self, Self::Error> {
        match args.0 {
            SubscriptionKind::Logs => {
                let filter = args.1.map(|f| *f).unwrap_or_default();
                Ok(InterestKind::Log(Box::new(LogCriteria::new(filter))))
            }
            SubscriptionKind::NewHeads => {
                if args.1.is_some() {
                    Err("filter not supported for newHeads subscription".to_string())
                } else {
                    Ok(InterestKind::Block)
                }
            }
            SubscriptionKind::NewPendingTransactions => {
                if args.1.is_some() {
                    Err("filter not supported for newPendingTransactions subscription"
                        .to_string())
                } else {
                    Ok(InterestKind::PendingTransaction)
                }
            }
            _ => Err(format!("unsupported subscription kind: {:?}", args.0)),
        }
    }
}

pub(super) async fn not_supported() -> ResponsePayload<(), ()> {
    ResponsePayload::internal_error_message(Cow::Borrowed(
        "the method is not supported by this development node",
    ))
}

pub(super) async fn syncing() -> Result<bool, ()> {
    Ok(false)
}

pub(super) async fn chain_id(ctx: RpcCtx) -> Result<U64, ()> {
    Ok(U64::from(ctx.node().chain_id()))
}

pub(super) async fn coinbase(ctx: RpcCtx) -> Result<Address, ()> {
    Ok(ctx.node().coinbase())
}

pub(super) async fn accounts(ctx: RpcCtx) -> Result<Vec<Address>, ()> {
    Ok(ctx.node().accounts())
}

pub(super) async fn block_number(hctx: HandlerCtx, ctx: RpcCtx) -> Result<U64, String> {
    let task = async move { Ok(U64::from(ctx.node().head_number())) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn mining(hctx: HandlerCtx, ctx: RpcCtx) -> Result<bool, String> {
    let task = async move { Ok(ctx.node().automine()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn block<T>(
    hctx: HandlerCtx,
    BlockParams(t, full): BlockParams<T>,
    ctx: RpcCtx,
) -> Result<Option<Block>, String>
where
    T: Into<BlockId>,
{
    let id = t.into();
    let task = async move {
        ctx.node().block_by_id(id, full.unwrap_or_default()).map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn block_tx_count<T>(
    hctx: HandlerCtx,
    (t,): (T,),
    ctx: RpcCtx,
) -> Result<Option<U64>, String>
where
    T: Into<BlockId>,
{
    let id = t.into();
    let task = async move {
        ctx.node()
            .block_transaction_count(id)
            .map(|count| count.map(U64::from))
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn block_receipts(
    hctx: HandlerCtx,
    (id,): (BlockId,),
    ctx: RpcCtx,
) -> Result<Option<Vec<TransactionReceipt>>, String> {
    let task = async move { ctx.node().block_receipts(id).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn transaction_by_hash(
    hctx: HandlerCtx,
    (hash,): (B256,),
    ctx: RpcCtx,
) -> Result<Option<Transaction>, String> {
    let task = async move { Ok(ctx.node().transaction_by_hash(hash)) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn transaction_by_block_and_index<T>(
    hctx: HandlerCtx,
    (t, index): (T, U64),
    ctx: RpcCtx,
) -> Result<Option<Transaction>, String>
where
    T: Into<BlockId>,
{
    let id = t.into();
    let task = async move {
        ctx.node()
            .transaction_by_block_and_index(id, index.to::<usize>())
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn transaction_receipt(
    hctx: HandlerCtx,
    (hash,): (B256,),
    ctx: RpcCtx,
) -> Result<Option<TransactionReceipt>, String> {
    let task = async move { Ok(ctx.node().transaction_receipt(hash)) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn pending_transactions(
    hctx: HandlerCtx,
    ctx: RpcCtx,
) -> Result<Vec<Transaction>, String> {
    let task = async move { Ok(ctx.node().pending_transactions()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn balance(
    hctx: HandlerCtx,
    AddrWithBlock(address, block): AddrWithBlock,
    ctx: RpcCtx,
) -> Result<U256, String> {
    let block = block.unwrap_or(BlockId::latest());
    let task = async move { ctx.node().balance(address, block).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn storage_at(
    hctx: HandlerCtx,
    StorageAtArgs(address, slot, block): StorageAtArgs,
    ctx: RpcCtx,
) -> Result<B256, String> {
    let block = block.unwrap_or(BlockId::latest());
    let task =
        async move { ctx.node().storage_at(address, slot, block).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn addr_tx_count(
    hctx: HandlerCtx,
    AddrWithBlock(address, block): AddrWithBlock,
    ctx: RpcCtx,
) -> Result<U64, String> {
    let block = block.unwrap_or(BlockId::latest());
    let task = async move {
        ctx.node()
            .transaction_count(address, block)
            .map(U64::from)
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn code_at(
    hctx: HandlerCtx,
    AddrWithBlock(address, block): AddrWithBlock,
    ctx: RpcCtx,
) -> Result<Bytes, String> {
    let block = block.unwrap_or(BlockId::latest());
    let task = async move { ctx.node().code(address, block).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn call(
    hctx: HandlerCtx,
    TxParams(request, block): TxParams,
    ctx: RpcCtx,
) -> Result<Bytes, String> {
    let id = block.unwrap_or(BlockId::latest());
    let task = async move { ctx.node().call(&request, id).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn estimate_gas(
    hctx: HandlerCtx,
    TxParams(request, _block): TxParams,
    ctx: RpcCtx,
) -> Result<U64, String> {
    let task = async move {
        ctx.node().estimate_gas(&request).map(U64::from).map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn gas_price(hctx: HandlerCtx, ctx: RpcCtx) -> Result<U256, String> {
    let task = async move { Ok(U256::from(ctx.node().gas_price())) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn max_priority_fee_per_gas(ctx: RpcCtx) -> Result<U256, ()> {
    Ok(U256::from(ctx.node().max_priority_fee_per_gas()))
}

pub(super) async fn fee_history(
    hctx: HandlerCtx,
    FeeHistoryArgs(block_count, newest, reward_percentiles): FeeHistoryArgs,
    ctx: RpcCtx,
) -> Result<FeeHistory, String> {
    let task = async move {
        ctx.node()
            .fee_history(block_count.to::<u64>(), newest, reward_percentiles)
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn send_raw_transaction(
    hctx: HandlerCtx,
    (tx,): (Bytes,),
    ctx: RpcCtx,
) -> Result<B256, String> {
    let task =
        async move { ctx.node().send_raw_transaction(&tx).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn send_transaction(
    hctx: HandlerCtx,
    (tx,): (TransactionRequest,),
    ctx: RpcCtx,
) -> Result<B256, String> {
    let task = async move { ctx.node().send_transaction(tx).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn sign(
    hctx: HandlerCtx,
    SignArgs(address, message): SignArgs,
    ctx: RpcCtx,
) -> Result<Bytes, String> {
    let task = async move {
        ctx.node()
            .sign_message(address, &message)
            .map(|sig| sig.as_bytes().to_vec().into())
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn sign_typed_data_v4(
    hctx: HandlerCtx,
    (address, data): (Address, TypedData),
    ctx: RpcCtx,
) -> Result<Bytes, String> {
    let task = async move {
        ctx.node()
            .sign_typed_data(address, &data)
            .map(|sig| sig.as_bytes().to_vec().into())
            .map_err(|e| e.to_string())
    };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn get_logs(
    hctx: HandlerCtx,
    (filter,): (Filter,),
    ctx: RpcCtx,
) -> Result<Vec<Log>, String> {
    let task = async move { ctx.node().logs(filter).map_err(|e| e.to_string()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn new_filter(
    hctx: HandlerCtx,
    (filter,): (Filter,),
    ctx: RpcCtx,
) -> Result<U64, String> {
    let task = async move { Ok(ctx.node().filters().install_log_filter(filter)) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn new_block_filter(hctx: HandlerCtx, ctx: RpcCtx) -> Result<U64, String> {
    let task = async move { Ok(ctx.node().filters().install_block_filter()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn new_pending_transaction_filter(
    hctx: HandlerCtx,
    ctx: RpcCtx,
) -> Result<U64, String> {
    let task = async move { Ok(ctx.node().filters().install_pending_tx_filter()) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn uninstall_filter(
    hctx: HandlerCtx,
    (id,): (U64,),
    ctx: RpcCtx,
) -> Result<bool, String> {
    let task = async move { Ok(ctx.node().filters().uninstall(id)) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn get_filter_changes(
    hctx: HandlerCtx,
    (id,): (U64,),
    ctx: RpcCtx,
) -> Result<FilterOutput, String> {
    let task = async move { ctx.filter_changes(id).map_err(EthError::into_string) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn get_filter_logs(
    hctx: HandlerCtx,
    (id,): (U64,),
    ctx: RpcCtx,
) -> Result<Vec<Log>, String> {
    let task = async move { ctx.filter_logs(id).map_err(EthError::into_string) };

    await_jh_option!(hctx.spawn_blocking(task))
}

pub(super) async fn subscribe(
    hctx: HandlerCtx,
    sub: SubscribeArgs,
    ctx: RpcCtx,
) -> Result<U64, String> {
    let kind = sub.try_into()?;

    let task = |hctx| async move {
        ctx.subscriptions()
            .subscribe(&hctx, kind)
            .ok_or_else(|| "pubsub not enabled".to_string())
    };

    await_jh_option!(hctx.spawn_blocking_with_ctx(task))
}

pub(super) async fn unsubscribe(
    hctx: HandlerCtx,
    (id,): (U64,),
    ctx: RpcCtx,
) -> Result<bool, String> {
    let task = async move { Ok(ctx.subscriptions().unsubscribe(id)) };

    await_jh_option!(hctx.spawn_blocking(task))
}
