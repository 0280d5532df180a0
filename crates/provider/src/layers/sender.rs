use crate::{
    request::{is_transaction_method, read_tx_request, write_tx_request},
    BoxTransport, ProviderError, Result, Transport,
};
use alloy::primitives::Address;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::trace;

/// Fills a missing `from` on call, estimate, and send requests.
///
/// Uses the configured fixed sender if one is set; otherwise the first
/// address the upstream reports for `eth_accounts`, looked up once and
/// cached. A `sendTransaction` with no derivable sender is a hard error;
/// read-only calls are forwarded untouched and left to the server.
#[derive(Debug)]
pub struct SenderLayer {
    inner: BoxTransport,
    fixed: Option<Address>,
    discovered: OnceCell<Option<Address>>,
}

impl SenderLayer {
    /// Wrap `inner`. When `fixed` is set, account discovery is skipped.
    pub fn new(inner: BoxTransport, fixed: Option<Address>) -> Self {
        Self { inner, fixed, discovered: OnceCell::new() }
    }

    async fn default_sender(&self) -> Result<Option<Address>> {
        if let Some(fixed) = self.fixed {
            return Ok(Some(fixed));
        }
        self.discovered
            .get_or_try_init(|| async {
                let accounts = self.inner.request("eth_accounts", json!([])).await?;
                let accounts: Vec<Address> = serde_json::from_value(accounts)?;
                Ok::<_, ProviderError>(accounts.first().copied())
            })
            .await
            .copied()
    }
}

#[async_trait::async_trait]
impl Transport for SenderLayer {
    async fn request(&self, method: &str, mut params: Value) -> Result<Value> {
        if is_transaction_method(method) {
            if let Some(mut tx) = read_tx_request(&params) {
                if tx.from.is_none() {
                    match self.default_sender().await? {
                        Some(sender) => {
                            trace!(%sender, method, "filled missing sender");
                            tx.from = Some(sender);
                            write_tx_request(&mut params, &tx)?;
                        }
                        None if method == "eth_sendTransaction" => {
                            return Err(ProviderError::MissingSender);
                        }
                        None => {}
                    }
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
    use alloy::primitives::address;
    use std::sync::Arc;

    const FIRST: Address = address!("4f3e91d2cacd82fffd1f33a0d26d4078401986e9");

    #[tokio::test]
    async fn first_account_is_discovered_and_cached() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_accounts", json!([FIRST]))
                .respond("eth_call", json!("0x")),
        );
        let layer = SenderLayer::new(Box::new(mock.clone()), None);

        layer.request("eth_call", json!([{}, "latest"])).await.unwrap();
        layer.request("eth_call", json!([{}, "latest"])).await.unwrap();

        let sent = mock.params_of("eth_call", 1).unwrap();
        assert_eq!(sent[0]["from"], json!(FIRST));
        assert_eq!(mock.calls().iter().filter(|(m, _)| m == "eth_accounts").count(), 1);
    }

    #[tokio::test]
    async fn explicit_sender_left_untouched() {
        let other = address!("2a97a65d5673a2c61e95ce33cecadf24f654f96d");
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendTransaction", json!("0x00")));
        let layer = SenderLayer::new(Box::new(mock.clone()), Some(FIRST));

        layer
            .request("eth_sendTransaction", json!([{ "from": other, "gas": "0x5208" }]))
            .await
            .unwrap();

        let sent = mock.params_of("eth_sendTransaction", 0).unwrap();
        assert_eq!(sent[0]["from"], json!(other));
    }

    #[tokio::test]
    async fn send_without_derivable_sender_is_an_error() {
        let mock = MockTransport::new().respond("eth_accounts", json!([]));
        let layer = SenderLayer::new(Box::new(mock), None);

        let err = layer.request("eth_sendTransaction", json!([{}])).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingSender));
    }
}
