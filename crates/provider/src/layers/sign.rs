use crate::{
    request::{parse_quantity, read_tx_request},
    AccountKeyStore, BoxTransport, ProviderError, Result, Transport,
};
use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEip2930, TxEip7702, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Address, TxKind},
    rpc::types::TransactionRequest,
};
use serde_json::{json, Value};
use tracing::{debug, trace};

/// Signs transactions from locally controlled accounts.
///
/// A `sendTransaction` whose `from` is in the key store is validated, filled
/// with a pending nonce if needed, signed, RLP-serialized and submitted as
/// `sendRawTransaction`. Senders not in the store are forwarded unmodified
/// and assumed to be signed remotely.
///
/// Validation is strict: `gas` must already be present (a locally signed
/// transaction never defaults its gas), and exactly one fee scheme — legacy
/// `gasPrice` or the complete EIP-1559 pair — must be supplied.
#[derive(Debug)]
pub struct SigningLayer {
    inner: BoxTransport,
    store: AccountKeyStore,
    chain_id: u64,
}

impl SigningLayer {
    /// Wrap `inner`, signing for `store` on chain `chain_id`.
    pub const fn new(inner: BoxTransport, store: AccountKeyStore, chain_id: u64) -> Self {
        Self { inner, store, chain_id }
    }

    /// The locally controlled accounts.
    pub const fn store(&self) -> &AccountKeyStore {
        &self.store
    }

    fn validate_fee_scheme(tx: &TransactionRequest) -> Result<()> {
        let legacy = tx.gas_price.is_some();
        let market = tx.max_fee_per_gas.is_some() || tx.max_priority_fee_per_gas.is_some();
        // Set-code transactions only exist in the fee-market shape.
        let set_code = tx.authorization_list.is_some();
        if legacy && (market || set_code) {
            return Err(ProviderError::ConflictingFeeFields);
        }
        if market || set_code {
            if tx.max_fee_per_gas.is_none() {
                return Err(ProviderError::IncompleteFeePair("maxFeePerGas"));
            }
            if tx.max_priority_fee_per_gas.is_none() {
                return Err(ProviderError::IncompleteFeePair("maxPriorityFeePerGas"));
            }
        }
        if !legacy && !market {
            return Err(ProviderError::MissingTxParam("gasPrice"));
        }
        Ok(())
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        let count = self
            .inner
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(parse_quantity(&count)? as u64)
    }

    async fn sign_and_submit(&self, tx: TransactionRequest, from: Address) -> Result<Value> {
        if tx.gas.is_none() {
            return Err(ProviderError::MissingTxParam("gas"));
        }
        Self::validate_fee_scheme(&tx)?;

        let nonce = match tx.nonce {
            Some(nonce) => nonce,
            None => self.pending_nonce(from).await?,
        };

        let signer =
            self.store.signer(&from).ok_or(ProviderError::UnknownAccount(from))?;
        let chain_id = tx.chain_id.unwrap_or(self.chain_id);
        let gas_limit = tx.gas.unwrap_or_default();
        let to = tx.to.unwrap_or(TxKind::Create);
        let value = tx.value.unwrap_or_default();
        let input = tx.input.into_input().unwrap_or_default();

        // Variant selection: an authorization list selects the set-code type,
        // a max-fee pair the fee-market type, an access list without one the
        // access-list type, anything else legacy.
        let envelope: TxEnvelope = if let Some(authorization_list) = tx.authorization_list.clone()
        {
            let TxKind::Call(to) = to else {
                return Err(ProviderError::MissingTxParam("to"));
            };
            let mut unsigned = TxEip7702 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                to,
                value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                authorization_list,
                input,
            };
            let signature = signer.sign_transaction_sync(&mut unsigned)?;
            unsigned.into_signed(signature).into()
        } else if let Some(max_fee_per_gas) = tx.max_fee_per_gas {
            let mut unsigned = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                to,
                value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                input,
            };
            let signature = signer.sign_transaction_sync(&mut unsigned)?;
            unsigned.into_signed(signature).into()
        } else if let Some(access_list) = tx.access_list.clone() {
            let mut unsigned = TxEip2930 {
                chain_id,
                nonce,
                gas_price: tx.gas_price.unwrap_or_default(),
                gas_limit,
                to,
                value,
                access_list,
                input,
            };
            let signature = signer.sign_transaction_sync(&mut unsigned)?;
            unsigned.into_signed(signature).into()
        } else {
            let mut unsigned = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price: tx.gas_price.unwrap_or_default(),
                gas_limit,
                to,
                value,
                input,
            };
            let signature = signer.sign_transaction_sync(&mut unsigned)?;
            unsigned.into_signed(signature).into()
        };

        let raw = alloy::hex::encode_prefixed(envelope.encoded_2718());
        debug!(%from, tx_hash = %envelope.tx_hash(), "signed transaction locally");
        self.inner.request("eth_sendRawTransaction", json!([raw])).await
    }
}

#[async_trait::async_trait]
impl Transport for SigningLayer {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if method == "eth_sendTransaction" {
            if let Some(tx) = read_tx_request(&params) {
                if let Some(from) = tx.from.filter(|f| self.store.contains(f)) {
                    return self.sign_and_submit(tx, from).await;
                }
                trace!("sender not locally controlled, forwarding unsigned");
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

    const MNEMONIC: &str =
        "couch hunt wisdom giant regret supreme issue sing enroll ankle type husband";
    const FROM: &str = "0x4f3e91d2cacd82fffd1f33a0d26d4078401986e9";
    const TO: &str = "0x2a97a65d5673a2c61e95ce33cecadf24f654f96d";

    // Known-good serialization of the legacy transaction below, signed by the
    // index-0 mnemonic account on chain 31337.
    const KNOWN_RAW: &str = "0xf86480830a5c00825208942a97a65d5673a2c61e95ce33cecadf24f654f96d018082f4f6a0d67f66eed7c5c822cc378592a6b07fa302e1943c53245e789421a9e46da0d1ffa073c0b5dc5d3e2d0c38270d77af954dc60be0a79e05197c6838983035bb389be8";

    fn layer(mock: Arc<MockTransport>) -> SigningLayer {
        let store = AccountKeyStore::from_mnemonic(MNEMONIC, 2).unwrap();
        SigningLayer::new(Box::new(mock), store, 31337)
    }

    fn vector_tx() -> Value {
        json!({
            "from": FROM,
            "to": TO,
            "gas": "0x5208",
            "gasPrice": "0xa5c00",
            "nonce": "0x0",
            "value": "0x1",
        })
    }

    #[tokio::test]
    async fn legacy_signing_is_bit_exact() {
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendRawTransaction", json!("0xaa")));
        let layer = layer(mock.clone());

        let result =
            layer.request("eth_sendTransaction", json!([vector_tx()])).await.unwrap();
        assert_eq!(result, json!("0xaa"));

        let sent = mock.params_of("eth_sendRawTransaction", 0).unwrap();
        assert_eq!(sent[0], json!(KNOWN_RAW));
        assert!(mock.calls().iter().all(|(m, _)| m != "eth_sendTransaction"));
    }

    #[tokio::test]
    async fn missing_nonce_is_filled_from_pending_count() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("eth_getTransactionCount", json!("0x0"))
                .respond("eth_sendRawTransaction", json!("0xaa")),
        );
        let layer = layer(mock.clone());

        let mut tx = vector_tx();
        tx.as_object_mut().unwrap().remove("nonce");
        layer.request("eth_sendTransaction", json!([tx])).await.unwrap();

        let count_params = mock.params_of("eth_getTransactionCount", 0).unwrap();
        assert_eq!(count_params, json!([FROM, "pending"]));
        let sent = mock.params_of("eth_sendRawTransaction", 0).unwrap();
        assert_eq!(sent[0], json!(KNOWN_RAW));
    }

    #[tokio::test]
    async fn missing_gas_never_defaults() {
        let layer = layer(Arc::new(MockTransport::new()));

        let mut tx = vector_tx();
        tx.as_object_mut().unwrap().remove("gas");
        let err =
            layer.request("eth_sendTransaction", json!([tx])).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingTxParam("gas")));
    }

    #[tokio::test]
    async fn conflicting_fee_schemes_are_rejected() {
        let layer = layer(Arc::new(MockTransport::new()));

        let mut tx = vector_tx();
        tx.as_object_mut().unwrap().insert("maxFeePerGas".into(), json!("0x10"));
        let err =
            layer.request("eth_sendTransaction", json!([tx])).await.unwrap_err();
        assert!(matches!(err, ProviderError::ConflictingFeeFields));
    }

    #[tokio::test]
    async fn incomplete_fee_pair_is_rejected() {
        let layer = layer(Arc::new(MockTransport::new()));

        let mut tx = vector_tx();
        tx.as_object_mut().unwrap().remove("gasPrice");
        tx.as_object_mut().unwrap().insert("maxFeePerGas".into(), json!("0x10"));
        let err =
            layer.request("eth_sendTransaction", json!([tx])).await.unwrap_err();
        assert!(matches!(err, ProviderError::IncompleteFeePair("maxPriorityFeePerGas")));
    }

    #[tokio::test]
    async fn foreign_senders_are_forwarded_unsigned() {
        let mock =
            Arc::new(MockTransport::new().respond("eth_sendTransaction", json!("0xbb")));
        let layer = layer(mock.clone());

        let mut tx = vector_tx();
        tx.as_object_mut().unwrap().insert(
            "from".into(),
            json!("0x0000000000000000000000000000000000000bad"),
        );
        let result =
            layer.request("eth_sendTransaction", json!([tx])).await.unwrap();

        assert_eq!(result, json!("0xbb"));
        assert!(mock.params_of("eth_sendRawTransaction", 0).is_none());
    }
}
