mod endpoints;
use endpoints::*;

mod error;
pub use error::EthError;

use crate::ctx::RpcCtx;
use alloy::{eips::BlockNumberOrTag, primitives::B256};

/// Instantiate the `eth` API router.
pub fn eth() -> ajj::Router<RpcCtx> {
    ajj::Router::new()
        .route("syncing", syncing)
        .route("chainId", chain_id)
        .route("coinbase", coinbase)
        .route("accounts", accounts)
        .route("blockNumber", block_number)
        .route("mining", mining)
        .route("getBlockByHash", block::<B256>)
        .route("getBlockByNumber", block::<BlockNumberOrTag>)
        .route("getBlockTransactionCountByHash", block_tx_count::<B256>)
        .route("getBlockTransactionCountByNumber", block_tx_count::<BlockNumberOrTag>)
        .route("getBlockReceipts", block_receipts)
        .route("getTransactionByHash", transaction_by_hash)
        .route("getTransactionByBlockHashAndIndex", transaction_by_block_and_index::<B256>)
        .route(
            "getTransactionByBlockNumberAndIndex",
            transaction_by_block_and_index::<BlockNumberOrTag>,
        )
        .route("getTransactionReceipt", transaction_receipt)
        .route("pendingTransactions", pending_transactions)
        .route("getBalance", balance)
        .route("getStorageAt", storage_at)
        .route("getTransactionCount", addr_tx_count)
        .route("getCode", code_at)
        .route("call", call)
        .route("estimateGas", estimate_gas)
        .route("gasPrice", gas_price)
        .route("maxPriorityFeePerGas", max_priority_fee_per_gas)
        .route("feeHistory", fee_history)
        .route("sendRawTransaction", send_raw_transaction)
        .route("sendTransaction", send_transaction)
        .route("sign", sign)
        .route("signTypedData_v4", sign_typed_data_v4)
        .route("getLogs", get_logs)
        .route("newFilter", new_filter)
        .route("newBlockFilter", new_block_filter)
        .route("newPendingTransactionFilter", new_pending_transaction_filter)
        .route("uninstallFilter", uninstall_filter)
        .route("getFilterChanges", get_filter_changes)
        .route("getFilterLogs", get_filter_logs)
        .route("subscribe", subscribe)
        .route("unsubscribe", unsubscribe)
        // ---------------
        //
        // Unsupported methods:
        //
        .route("protocolVersion", not_supported)
        .route("blobBaseFee", not_supported)
        .route("compileLLL", not_supported)
        .route("compileSerpent", not_supported)
        .route("compileSolidity", not_supported)
        .route("getCompilers", not_supported)
        .route("getUncleCountByBlockHash", not_supported)
        .route("getUncleCountByBlockNumber", not_supported)
        .route("getUncleByBlockHashAndIndex", not_supported)
        .route("getUncleByBlockNumberAndIndex", not_supported)
        .route("getWork", not_supported)
        .route("hashrate", not_supported)
        .route("submitHashrate", not_supported)
        .route("submitWork", not_supported)
        .route("signTransaction", not_supported)
        .route("getProof", not_supported)
        .route("createAccessList", not_supported)
}
