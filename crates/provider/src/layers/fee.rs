use crate::{
    request::{parse_quantity, read_tx_request, write_tx_request},
    BoxTransport, ProviderError, Result, Transport,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::trace;

/// Number of full blocks the base fee is projected forward when choosing a
/// default `maxFeePerGas`.
pub const BASE_FEE_PROJECTION_BLOCKS: u32 = 8;

/// Worst-case per-block base fee growth is 9/8.
const GROWTH_NUMERATOR: u128 = 9;
const GROWTH_DENOMINATOR: u128 = 8;

/// Smallest priority fee substituted when the upstream suggests zero.
const MIN_PRIORITY_FEE: u128 = 1;

/// Project `base_fee` forward by [`BASE_FEE_PROJECTION_BLOCKS`] worst-case
/// blocks, flooring once at the end rather than per step.
pub fn project_base_fee(base_fee: u128) -> u128 {
    let numerator = GROWTH_NUMERATOR.pow(BASE_FEE_PROJECTION_BLOCKS);
    let denominator = GROWTH_DENOMINATOR.pow(BASE_FEE_PROJECTION_BLOCKS);
    base_fee.saturating_mul(numerator) / denominator
}

/// Fills missing fee fields on `eth_sendTransaction`.
///
/// A transaction carrying `gasPrice` or any EIP-1559 field is forwarded
/// untouched. Otherwise: with a fixed gas price configured, that value is
/// substituted; with automatic pricing, EIP-1559 support is probed once via
/// `eth_feeHistory` and the fee pair (or a legacy `gasPrice`) is computed
/// from upstream suggestions.
#[derive(Debug)]
pub struct FeeLayer {
    inner: BoxTransport,
    fixed_gas_price: Option<u128>,
    eip1559_supported: OnceCell<bool>,
}

impl FeeLayer {
    /// Wrap `inner` with automatic fee resolution.
    pub fn automatic(inner: BoxTransport) -> Self {
        Self { inner, fixed_gas_price: None, eip1559_supported: OnceCell::new() }
    }

    /// Wrap `inner`, substituting a fixed legacy `gasPrice`.
    pub fn fixed(inner: BoxTransport, gas_price: u128) -> Self {
        Self { inner, fixed_gas_price: Some(gas_price), eip1559_supported: OnceCell::new() }
    }

    async fn supports_eip1559(&self) -> Result<bool> {
        self.eip1559_supported
            .get_or_try_init(|| async {
                match self.inner.request("eth_feeHistory", json!(["0x1", "latest", []])).await {
                    Ok(history) => Ok(history.get("baseFeePerGas").is_some()),
                    Err(e) if e.is_method_not_found() => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await
            .copied()
    }

    async fn suggested_priority_fee(&self) -> Result<u128> {
        let suggestion =
            match self.inner.request("eth_maxPriorityFeePerGas", json!([])).await {
                Ok(value) => parse_quantity(&value)?,
                Err(e) if e.is_method_not_found() => {
                    // Fall back to the median reward of the latest block.
                    let history = self
                        .inner
                        .request("eth_feeHistory", json!(["0x1", "latest", [50.0]]))
                        .await?;
                    history
                        .get("reward")
                        .and_then(|r| r.get(0))
                        .and_then(|r| r.get(0))
                        .map(parse_quantity)
                        .transpose()?
                        .unwrap_or(0)
                }
                Err(e) => return Err(e),
            };
        Ok(suggestion.max(MIN_PRIORITY_FEE))
    }

    async fn latest_base_fee(&self) -> Result<u128> {
        let history =
            self.inner.request("eth_feeHistory", json!(["0x1", "latest", []])).await?;
        history
            .get("baseFeePerGas")
            .and_then(|fees| fees.as_array())
            .and_then(|fees| fees.last())
            .map(parse_quantity)
            .transpose()?
            .ok_or_else(|| ProviderError::MalformedQuantity(history.to_string()))
    }

    async fn fill_fees(
        &self,
        tx: &mut alloy::rpc::types::TransactionRequest,
    ) -> Result<()> {
        if let Some(fixed) = self.fixed_gas_price {
            tx.gas_price = Some(fixed);
            return Ok(());
        }

        if self.supports_eip1559().await? {
            let priority = self.suggested_priority_fee().await?;
            let max_fee = project_base_fee(self.latest_base_fee().await?).max(priority);
            trace!(priority, max_fee, "computed EIP-1559 fee pair");
            tx.max_priority_fee_per_gas = Some(priority);
            tx.max_fee_per_gas = Some(max_fee);
        } else {
            let price = self.inner.request("eth_gasPrice", json!([])).await?;
            tx.gas_price = Some(parse_quantity(&price)?);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for FeeLayer {
    async fn request(&self, method: &str, mut params: Value) -> Result<Value> {
        if method == "eth_sendTransaction" {
            if let Some(mut tx) = read_tx_request(&params) {
                let priced = tx.gas_price.is_some()
                    || tx.max_fee_per_gas.is_some()
                    || tx.max_priority_fee_per_gas.is_some();
                if !priced {
                    self.fill_fees(&mut tx).await?;
                    write_tx_request(&mut params, &tx)?;
                }
            }
        }
        self.inner.request(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::sync::Arc;

    #[test]
    fn projection_floors_once_at_the_end() {
        // 80 * (9/8)^8 = 205.26..; per-step flooring would give 200.
        assert_eq!(project_base_fee(80), 205);
        assert_eq!(project_base_fee(0), 0);
    }

    #[tokio::test]
    async fn fixed_gas_price_fills_unpriced_transactions() {
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendTransaction", json!("0x00")));
        let layer = FeeLayer::fixed(Box::new(mock.clone()), 1232);

        layer.request("eth_sendTransaction", json!([{ "gas": "0x5208" }])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["gasPrice"], json!("0x4d0"));
    }

    #[tokio::test]
    async fn priced_transactions_are_untouched() {
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendTransaction", json!("0x00")));
        let layer = FeeLayer::fixed(Box::new(mock.clone()), 1232);

        layer
            .request("eth_sendTransaction", json!([{ "gasPrice": "0x10" }]))
            .await
            .unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["gasPrice"], json!("0x10"));
    }

    #[tokio::test]
    async fn eip1559_pair_computed_from_history() {
        let history = json!({
            "oldestBlock": "0x1",
            "baseFeePerGas": ["0x4b", "0x50"],
            "gasUsedRatio": [0.5],
        });
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_feeHistory", history)
                .respond("eth_maxPriorityFeePerGas", json!("0x2"))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = FeeLayer::automatic(Box::new(mock.clone()));

        layer.request("eth_sendTransaction", json!([{}])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["maxPriorityFeePerGas"], json!("0x2"));
        // base fee 0x50 = 80 projected forward.
        assert_eq!(sent[0]["maxFeePerGas"], json!("0xcd"));
    }

    #[tokio::test]
    async fn zero_priority_suggestion_becomes_one_wei() {
        let history = json!({
            "oldestBlock": "0x1",
            "baseFeePerGas": ["0x0", "0x0"],
            "gasUsedRatio": [0.0],
        });
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_feeHistory", history)
                .respond("eth_maxPriorityFeePerGas", json!("0x0"))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = FeeLayer::automatic(Box::new(mock.clone()));

        layer.request("eth_sendTransaction", json!([{}])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["maxPriorityFeePerGas"], json!("0x1"));
        assert_eq!(sent[0]["maxFeePerGas"], json!("0x1"));
    }

    #[tokio::test]
    async fn legacy_upstream_gets_gas_price() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_gasPrice", json!("0x3b9aca00"))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = FeeLayer::automatic(Box::new(mock.clone()));

        layer.request("eth_sendTransaction", json!([{}])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["gasPrice"], json!("0x3b9aca00"));
    }
}
