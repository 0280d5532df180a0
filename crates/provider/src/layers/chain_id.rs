use crate::{
    request::{parse_net_version, parse_quantity},
    BoxTransport, ProviderError, Result, Transport,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::trace;

/// Validates the upstream chain id before any other request is forwarded.
///
/// The id is fetched via `eth_chainId`, falling back to `net_version` (which
/// may report decimal or hex) when the upstream predates EIP-695. The check
/// runs at most once per provider instance; a mismatch is fatal and is
/// returned for every subsequent request without retrying.
#[derive(Debug)]
pub struct ChainIdLayer {
    inner: BoxTransport,
    expected: u64,
    /// `Err` holds the mismatching upstream id; transient fetch failures are
    /// not cached and will re-check.
    checked: OnceCell<std::result::Result<(), u64>>,
}

impl ChainIdLayer {
    /// Wrap `inner`, expecting the upstream to report `expected`.
    pub fn new(inner: BoxTransport, expected: u64) -> Self {
        Self { inner, expected, checked: OnceCell::new() }
    }

    async fn fetch_upstream_id(&self) -> Result<u64> {
        match self.inner.request("eth_chainId", json!([])).await {
            Ok(value) => Ok(parse_quantity(&value)? as u64),
            Err(e) if e.is_method_not_found() => {
                trace!("eth_chainId unavailable, falling back to net_version");
                let value = self.inner.request("net_version", json!([])).await?;
                parse_net_version(&value)
            }
            Err(e) => Err(e),
        }
    }

    async fn validate(&self) -> Result<()> {
        let outcome = self
            .checked
            .get_or_try_init(|| async {
                let actual = self.fetch_upstream_id().await?;
                Ok::<_, ProviderError>(if actual == self.expected { Ok(()) } else { Err(actual) })
            })
            .await?;
        outcome.map_err(|actual| ProviderError::InvalidChainId { expected: self.expected, actual })
    }
}

#[async_trait::async_trait]
impl Transport for ChainIdLayer {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.validate().await?;
        self.inner.request(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[tokio::test]
    async fn mismatch_fails_before_forwarding() {
        let mock = MockTransport::new()
            .respond("eth_chainId", json!("0xabcabc"))
            .respond("eth_blockNumber", json!("0x1"));
        let layer = ChainIdLayer::new(Box::new(mock), 66666);

        let err = layer.request("eth_blockNumber", json!([])).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidChainId { expected: 66666, actual: 0xabcabc }
        ));
    }

    #[tokio::test]
    async fn check_runs_once() {
        let mock = std::sync::Arc::new(
            MockTransport::new()
                .respond("eth_chainId", json!("0x7a69"))
                .respond("eth_blockNumber", json!("0x1")),
        );
        let layer = ChainIdLayer::new(Box::new(mock.clone()), 31337);

        layer.request("eth_blockNumber", json!([])).await.unwrap();
        layer.request("eth_blockNumber", json!([])).await.unwrap();

        let fetches =
            mock.calls().iter().filter(|(m, _)| m == "eth_chainId").count();
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn net_version_fallback_accepts_decimal() {
        let mock = MockTransport::new()
            .respond("net_version", json!("31337"))
            .respond("eth_blockNumber", json!("0x1"));
        let layer = ChainIdLayer::new(Box::new(mock), 31337);

        assert_eq!(layer.request("eth_blockNumber", json!([])).await.unwrap(), json!("0x1"));
    }
}
