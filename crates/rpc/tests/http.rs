//! End-to-end tests over a real HTTP listener.

use serde_json::{json, Value};
use simnode_node::{NodeConfig, SimNode};
use simnode_rpc::{router, RpcCtx};
use std::net::SocketAddr;

async fn spawn_node(config: NodeConfig) -> (SimNode, SocketAddr) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let node = SimNode::new(config).unwrap();
    let app = router().with_state(RpcCtx::new(node.clone())).into_axum("/");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (node, addr)
}

async fn rpc(addr: SocketAddr, method: &str, params: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://{addr}/"))
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn result(addr: SocketAddr, method: &str, params: Value) -> Value {
    let response = rpc(addr, method, params).await;
    assert!(
        response.get("error").is_none(),
        "unexpected error from {method}: {response}"
    );
    response["result"].clone()
}

#[tokio::test]
async fn connect_probes_report_the_simulated_chain() {
    let (_node, addr) = spawn_node(NodeConfig::default()).await;

    assert_eq!(result(addr, "eth_chainId", json!([])).await, json!("0x7a69"));
    assert_eq!(result(addr, "net_version", json!([])).await, json!("31337"));
    assert_eq!(result(addr, "eth_syncing", json!([])).await, json!(false));
    assert_eq!(result(addr, "eth_blockNumber", json!([])).await, json!("0x0"));
    assert_eq!(result(addr, "eth_mining", json!([])).await, json!(true));

    let accounts = result(addr, "eth_accounts", json!([])).await;
    assert_eq!(accounts.as_array().unwrap().len(), 20);

    let version = result(addr, "web3_clientVersion", json!([])).await;
    assert!(version.as_str().unwrap().starts_with("simnode/"));
}

#[tokio::test]
async fn transfer_round_trip() {
    let (node, addr) = spawn_node(NodeConfig::default()).await;
    let accounts = node.accounts();

    let hash = result(
        addr,
        "eth_sendTransaction",
        json!([{ "from": accounts[0], "to": accounts[1], "value": "0x1" }]),
    )
    .await;
    assert!(hash.as_str().unwrap().starts_with("0x"));

    assert_eq!(result(addr, "eth_blockNumber", json!([])).await, json!("0x1"));

    let receipt = result(addr, "eth_getTransactionReceipt", json!([hash])).await;
    assert_eq!(receipt["status"], json!("0x1"));
    assert_eq!(receipt["blockNumber"], json!("0x1"));

    let block = result(addr, "eth_getBlockByNumber", json!(["0x1", false])).await;
    assert_eq!(block["transactions"], json!([hash]));

    let tx = result(addr, "eth_getTransactionByHash", json!([hash])).await;
    assert_eq!(tx["blockNumber"], json!("0x1"));
}

#[tokio::test]
async fn block_filter_poll_cycle() {
    let (_node, addr) = spawn_node(NodeConfig::default()).await;

    let id = result(addr, "eth_newBlockFilter", json!([])).await;
    result(addr, "evm_mine", json!([])).await;

    let changes = result(addr, "eth_getFilterChanges", json!([id])).await;
    assert_eq!(changes.as_array().unwrap().len(), 1);

    // Consecutive drains are disjoint.
    let changes = result(addr, "eth_getFilterChanges", json!([id])).await;
    assert_eq!(changes, json!([]));

    assert_eq!(result(addr, "eth_uninstallFilter", json!([id])).await, json!(true));
    assert_eq!(result(addr, "eth_uninstallFilter", json!([id])).await, json!(false));

    let response = rpc(addr, "eth_getFilterChanges", json!([id])).await;
    assert!(response.get("error").is_some());
}

#[tokio::test]
async fn snapshot_and_revert_move_the_head() {
    let (_node, addr) = spawn_node(NodeConfig::default()).await;

    let snapshot = result(addr, "evm_snapshot", json!([])).await;
    result(addr, "evm_mine", json!([])).await;
    result(addr, "evm_mine", json!([])).await;
    assert_eq!(result(addr, "eth_blockNumber", json!([])).await, json!("0x2"));

    assert_eq!(result(addr, "evm_revert", json!([snapshot.clone()])).await, json!(true));
    assert_eq!(result(addr, "eth_blockNumber", json!([])).await, json!("0x0"));
    // Consumed snapshots do not revert twice.
    assert_eq!(result(addr, "evm_revert", json!([snapshot])).await, json!(false));
}

#[tokio::test]
async fn legacy_methods_are_rejected() {
    let (_node, addr) = spawn_node(NodeConfig::default()).await;

    for method in ["eth_getWork", "eth_compileSolidity", "eth_getUncleCountByBlockHash"] {
        let response = rpc(addr, method, json!([])).await;
        assert!(response.get("error").is_some(), "{method} should be unsupported");
    }
}

#[tokio::test]
async fn subscriptions_require_a_push_transport() {
    let (_node, addr) = spawn_node(NodeConfig::default()).await;

    let response = rpc(addr, "eth_subscribe", json!(["newHeads"])).await;
    assert!(response.get("error").is_some());
}

#[tokio::test]
async fn pending_transactions_visible_without_automine() {
    let config = NodeConfig { automine: false, ..Default::default() };
    let (node, addr) = spawn_node(config).await;
    let accounts = node.accounts();

    assert_eq!(result(addr, "eth_mining", json!([])).await, json!(false));

    let hash = result(
        addr,
        "eth_sendTransaction",
        json!([{ "from": accounts[0], "to": accounts[1], "value": "0x1" }]),
    )
    .await;

    let pending = result(addr, "eth_pendingTransactions", json!([])).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // Pending tag counts pooled transactions.
    let count = result(
        addr,
        "eth_getTransactionCount",
        json!([accounts[0], "pending"]),
    )
    .await;
    assert_eq!(count, json!("0x1"));

    result(addr, "evm_mine", json!([])).await;
    let receipt = result(addr, "eth_getTransactionReceipt", json!([hash])).await;
    assert_eq!(receipt["blockNumber"], json!("0x1"));
}
