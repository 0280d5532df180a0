use crate::{
    request::{parse_quantity, read_tx_request, to_quantity, write_tx_request},
    BoxTransport, ProviderError, Result, Transport,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::trace;

/// Client-version marker of upstreams known to under-estimate gas.
const UNDER_ESTIMATING_CLIENT: &str = "TestRPC";

/// Factor applied to estimates from an under-estimating upstream.
const QUIRK_MULTIPLIER: u128 = 5;

/// Fills a missing `gas` on `eth_sendTransaction`.
///
/// With a fixed value configured, that value is used verbatim. Otherwise the
/// transaction is estimated upstream and the estimate scaled by the
/// configured multiplier. The latest block's gas limit is fetched once and
/// cached; a scaled estimate above the limit minus a 5% safety margin is
/// clamped down to that margin.
#[derive(Debug)]
pub struct GasLayer {
    inner: BoxTransport,
    fixed: Option<u64>,
    multiplier: f64,
    block_gas_limit: OnceCell<u64>,
}

impl GasLayer {
    /// Wrap `inner` with automatic estimation scaled by `multiplier`.
    pub fn automatic(inner: BoxTransport, multiplier: f64) -> Self {
        Self { inner, fixed: None, multiplier, block_gas_limit: OnceCell::new() }
    }

    /// Wrap `inner`, always substituting `gas` with a fixed value.
    pub fn fixed(inner: BoxTransport, gas: u64) -> Self {
        Self { inner, fixed: Some(gas), multiplier: 1.0, block_gas_limit: OnceCell::new() }
    }

    async fn latest_gas_limit(&self) -> Result<u64> {
        self.block_gas_limit
            .get_or_try_init(|| async {
                let block =
                    self.inner.request("eth_getBlockByNumber", json!(["latest", false])).await?;
                let limit = block
                    .get("gasLimit")
                    .ok_or_else(|| ProviderError::MalformedQuantity(block.to_string()))?;
                Ok::<_, ProviderError>(parse_quantity(limit)? as u64)
            })
            .await
            .copied()
    }

    async fn resolve_gas(&self, tx_params: &Value) -> Result<u64> {
        if let Some(fixed) = self.fixed {
            return Ok(fixed);
        }

        let estimate =
            self.inner.request("eth_estimateGas", json!([tx_params[0], "pending"])).await?;
        let estimate = parse_quantity(&estimate)? as u64;
        let scaled = (estimate as f64 * self.multiplier).floor() as u64;

        let limit = self.latest_gas_limit().await?;
        let usable = limit - limit / 20;
        if scaled > usable {
            trace!(scaled, limit, usable, "scaled estimate above usable block gas, clamping");
            return Ok(usable - 1);
        }
        Ok(scaled)
    }
}

#[async_trait::async_trait]
impl Transport for GasLayer {
    async fn request(&self, method: &str, mut params: Value) -> Result<Value> {
        if method == "eth_sendTransaction" {
            if let Some(mut tx) = read_tx_request(&params) {
                if tx.gas.is_none() {
                    tx.gas = Some(self.resolve_gas(&params).await?);
                    write_tx_request(&mut params, &tx)?;
                }
            }
        }
        self.inner.request(method, params).await
    }
}

/// Workaround for upstreams whose gas estimates are systematically low.
///
/// Detection reads `web3_clientVersion` once per provider instance; when the
/// marker matches, every `eth_estimateGas` response is multiplied by a fixed
/// factor on its way back out.
#[derive(Debug)]
pub struct GasEstimateQuirkLayer {
    inner: BoxTransport,
    detected: OnceCell<bool>,
}

impl GasEstimateQuirkLayer {
    /// Wrap `inner`.
    pub fn new(inner: BoxTransport) -> Self {
        Self { inner, detected: OnceCell::new() }
    }

    async fn upstream_under_estimates(&self) -> Result<bool> {
        self.detected
            .get_or_try_init(|| async {
                let version = self.inner.request("web3_clientVersion", json!([])).await?;
                Ok::<_, ProviderError>(
                    version.as_str().is_some_and(|v| v.contains(UNDER_ESTIMATING_CLIENT)),
                )
            })
            .await
            .copied()
    }
}

#[async_trait::async_trait]
impl Transport for GasEstimateQuirkLayer {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if method != "eth_estimateGas" {
            return self.inner.request(method, params).await;
        }

        let response = self.inner.request(method, params).await?;
        if self.upstream_under_estimates().await? {
            let adjusted = parse_quantity(&response)?.saturating_mul(QUIRK_MULTIPLIER);
            return Ok(to_quantity(adjusted));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::sync::Arc;

    fn latest_block(gas_limit: u64) -> Value {
        json!({ "gasLimit": format!("0x{gas_limit:x}"), "number": "0x1" })
    }

    #[tokio::test]
    async fn missing_gas_is_estimated_and_scaled() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_estimateGas", json!("0x5208"))
                .respond("eth_getBlockByNumber", latest_block(30_000_000))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = GasLayer::automatic(Box::new(mock.clone()), 1.5);

        layer.request("eth_sendTransaction", json!([{ "from": "0x0000000000000000000000000000000000000001" }])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        // floor(21000 * 1.5) = 31500 = 0x7b0c
        assert_eq!(sent[0]["gas"], json!("0x7b0c"));
    }

    #[tokio::test]
    async fn oversized_estimate_clamps_to_safety_margin() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_estimateGas", json!("0x1c9c380")) // 30M
                .respond("eth_getBlockByNumber", latest_block(30_000_000))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = GasLayer::automatic(Box::new(mock.clone()), 1.0);

        layer.request("eth_sendTransaction", json!([{}])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        // 30M minus the 5% margin, minus one.
        assert_eq!(sent[0]["gas"], json!(to_quantity(28_499_999)));
    }

    #[tokio::test]
    async fn clamping_never_raises_gas_above_the_margin() {
        // 28.6M sits between the margin cap (28.5M) and the raw limit, so a
        // clamp to anything above the cap would hand out more gas than the
        // estimate asked for.
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_estimateGas", json!(to_quantity(28_600_000)))
                .respond("eth_getBlockByNumber", latest_block(30_000_000))
                .respond("eth_sendTransaction", json!("0x00")),
        );
        let layer = GasLayer::automatic(Box::new(mock.clone()), 1.0);

        layer.request("eth_sendTransaction", json!([{}])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["gas"], json!(to_quantity(28_499_999)));
    }

    #[tokio::test]
    async fn explicit_gas_is_left_untouched() {
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendTransaction", json!("0x00")));
        let layer = GasLayer::fixed(Box::new(mock.clone()), 1_000_000);

        layer.request("eth_sendTransaction", json!([{ "gas": "0x5208" }])).await.unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["gas"], json!("0x5208"));
        assert!(mock.calls().iter().all(|(m, _)| m == "eth_sendTransaction"));
    }

    #[tokio::test]
    async fn quirk_multiplies_estimates_five_fold() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("web3_clientVersion", json!("EthereumJS TestRPC/v2.13.2/ethereum-js"))
                .respond("eth_estimateGas", json!("0x5208")),
        );
        let layer = GasEstimateQuirkLayer::new(Box::new(mock.clone()));

        let result = layer.request("eth_estimateGas", json!([{}])).await.unwrap();
        assert_eq!(result, json!(to_quantity(21_000 * 5)));

        // Detection is cached.
        layer.request("eth_estimateGas", json!([{}])).await.unwrap();
        assert_eq!(
            mock.calls().iter().filter(|(m, _)| m == "web3_clientVersion").count(),
            1
        );
    }

    #[tokio::test]
    async fn quirk_is_inert_on_well_behaved_upstreams() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("web3_clientVersion", json!("reference-client/v1.0.0"))
                .respond("eth_estimateGas", json!("0x5208")),
        );
        let layer = GasEstimateQuirkLayer::new(Box::new(mock));

        let result = layer.request("eth_estimateGas", json!([{}])).await.unwrap();
        assert_eq!(result, json!("0x5208"));
    }
}
