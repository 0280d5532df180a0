//! Shared helpers for interceptor layers: transaction-request extraction and
//! hex quantity parsing.

use crate::{ProviderError, Result};
use alloy::rpc::types::TransactionRequest;
use serde_json::Value;

/// True for the methods whose first positional parameter is a transaction
/// request object.
pub fn is_transaction_method(method: &str) -> bool {
    matches!(method, "eth_sendTransaction" | "eth_call" | "eth_estimateGas")
}

/// Deserialize the transaction-request object at position 0 of `params`.
///
/// Returns `None` when the params are not an array or carry no object there,
/// in which case a layer forwards the request untouched and lets the server
/// produce the validation error.
pub fn read_tx_request(params: &Value) -> Option<TransactionRequest> {
    let first = params.as_array()?.first()?;
    serde_json::from_value(first.clone()).ok()
}

/// Write a (possibly rewritten) transaction request back into position 0.
pub fn write_tx_request(params: &mut Value, tx: &TransactionRequest) -> Result<()> {
    if let Some(first) = params.as_array_mut().and_then(|a| a.first_mut()) {
        *first = serde_json::to_value(tx)?;
    }
    Ok(())
}

/// Parse a hex-encoded JSON-RPC quantity.
pub fn parse_quantity(value: &Value) -> Result<u128> {
    let text = value.as_str().ok_or_else(|| malformed(value))?;
    let digits = text.strip_prefix("0x").ok_or_else(|| malformed(value))?;
    u128::from_str_radix(digits, 16).map_err(|_| malformed(value))
}

/// Parse a chain id reported by `net_version`, which may be decimal or hex.
pub fn parse_net_version(value: &Value) -> Result<u64> {
    let text = value.as_str().ok_or_else(|| malformed(value))?;
    let parsed = match text.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| malformed(value))
}

/// Encode a quantity the way the wire expects it: `0x`-prefixed hex with no
/// leading zeros.
pub fn to_quantity(value: u128) -> Value {
    Value::String(format!("0x{value:x}"))
}

fn malformed(value: &Value) -> ProviderError {
    ProviderError::MalformedQuantity(value.to_string())
}
