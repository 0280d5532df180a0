use crate::{
    engine::ExecutionEngine, ChainNotification, FilterRegistry, Hardfork, NodeConfig, NodeError,
    Result, TransferEngine,
};
use alloy::{
    consensus::{
        transaction::SignerRecoverable, Header, SignableTransaction, Transaction, TxEip1559,
        TxEip2930, TxEip7702, TxEnvelope, TxLegacy,
    },
    dyn_abi::TypedData,
    eips::{
        eip1559::{calc_next_block_base_fee, BaseFeeParams},
        eip2718::{Decodable2718, Encodable2718},
        BlockId, BlockNumberOrTag,
    },
    network::TxSignerSync,
    primitives::{Address, Bloom, Bytes, Signature, TxKind, B256, U256},
    rpc::types::{Block, FeeHistory, Filter, Log, TransactionReceipt, TransactionRequest},
    signers::SignerSync,
};
use parking_lot::Mutex;
use simnode_ledger::{LedgerIndex, LogCriteria, MinedBlock, MinedReceipt};
use simnode_provider::{AccountKeyStore, ProviderError};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

/// Suggested priority fee, and the margin `eth_gasPrice` adds on top of the
/// next base fee.
const SUGGESTED_PRIORITY_FEE: u128 = 1_000_000_000;

/// Legacy gas price reported when the fee market is inactive.
const LEGACY_GAS_PRICE: u128 = 8_000_000_000;

/// Most blocks `eth_feeHistory` will report in one call.
const MAX_FEE_HISTORY: u64 = 1_024;

/// A block tag resolved against the current chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    /// The not-yet-mined block. Never collapses to a concrete number.
    Pending,
    /// A concrete canonical block number.
    Number(u64),
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    id: u64,
    head: u64,
}

/// Chain state guarded by the node's single mutation lock.
struct ChainState {
    ledger: LedgerIndex,
    engine: Box<dyn ExecutionEngine>,
    pending: Vec<alloy::consensus::transaction::Recovered<TxEnvelope>>,
    automine: bool,
    snapshots: Vec<Snapshot>,
    next_snapshot_id: u64,
}

impl std::fmt::Debug for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainState")
            .field("head", &self.ledger.head_number())
            .field("pending", &self.pending.len())
            .field("automine", &self.automine)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct NodeInner {
    config: NodeConfig,
    keystore: AccountKeyStore,
    filters: FilterRegistry,
    notifications: broadcast::Sender<ChainNotification>,
    pending_notifications: broadcast::Sender<B256>,
    chain: Mutex<ChainState>,
}

/// The simulated node.
///
/// Cheap to clone; all clones share one chain. Mining, transaction
/// acceptance and reverts serialize on a single lock, so one request's
/// side effects complete before the next mutation begins. Filter
/// accumulators are fed inside that lock.
#[derive(Debug, Clone)]
pub struct SimNode {
    inner: Arc<NodeInner>,
}

impl SimNode {
    /// Create a node with the built-in transfer engine.
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_engine(config, Box::new(TransferEngine::new()))
    }

    /// Create a node around a custom execution engine.
    ///
    /// Derives and funds the configured accounts, mines the genesis block
    /// and spawns the filter sweeper.
    pub fn with_engine(config: NodeConfig, mut engine: Box<dyn ExecutionEngine>) -> Result<Self> {
        let keystore = AccountKeyStore::from_mnemonic(&config.mnemonic, config.accounts)?;
        for address in keystore.addresses() {
            engine.set_balance(*address, config.initial_balance);
        }

        let genesis = Header {
            number: 0,
            gas_limit: config.block_gas_limit,
            base_fee_per_gas: config.hardfork.supports_eip1559().then_some(config.initial_base_fee),
            beneficiary: config.coinbase,
            timestamp: unix_now(),
            ..Default::default()
        };
        let genesis = Arc::new(MinedBlock::seal(genesis, vec![]));
        info!(hash = %genesis.hash, chain_id = config.chain_id, "starting simulated chain");

        let mut ledger = LedgerIndex::new(config.ledger);
        ledger.add_block(genesis, U256::ZERO);

        let filters = FilterRegistry::new(config.filter_sweep_interval, config.filter_idle_timeout);
        let (notifications, _) = broadcast::channel(256);
        let (pending_notifications, _) = broadcast::channel(256);
        let automine = config.automine;

        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                keystore,
                filters,
                notifications,
                pending_notifications,
                chain: Mutex::new(ChainState {
                    ledger,
                    engine,
                    pending: Vec::new(),
                    automine,
                    snapshots: Vec::new(),
                    next_snapshot_id: 1,
                }),
            }),
        })
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// The chain id the node enforces and reports.
    pub fn chain_id(&self) -> u64 {
        self.inner.config.chain_id
    }

    /// The block beneficiary.
    pub fn coinbase(&self) -> Address {
        self.inner.config.coinbase
    }

    /// The locally controlled accounts, in derivation order.
    pub fn accounts(&self) -> Vec<Address> {
        self.inner.keystore.addresses().to_vec()
    }

    /// The signing keys behind [`Self::accounts`].
    pub fn keystore(&self) -> &AccountKeyStore {
        &self.inner.keystore
    }

    /// The filter registry.
    pub fn filters(&self) -> &FilterRegistry {
        &self.inner.filters
    }

    /// Subscribe to mined-block notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainNotification> {
        self.inner.notifications.subscribe()
    }

    /// Subscribe to the hashes of transactions entering the pool.
    pub fn subscribe_pending_transactions(&self) -> broadcast::Receiver<B256> {
        self.inner.pending_notifications.subscribe()
    }

    /// The current head block number.
    pub fn head_number(&self) -> u64 {
        self.inner.chain.lock().ledger.head_number().unwrap_or_default()
    }

    /// Whether transactions are mined immediately on acceptance.
    pub fn automine(&self) -> bool {
        self.inner.chain.lock().automine
    }

    /// Toggle automining.
    pub fn set_automine(&self, automine: bool) {
        self.inner.chain.lock().automine = automine;
    }

    fn resolve_ref(state: &ChainState, id: BlockId) -> Result<BlockRef> {
        let head = state.ledger.head_number().unwrap_or_default();
        match id {
            BlockId::Number(tag) => match tag {
                BlockNumberOrTag::Latest
                | BlockNumberOrTag::Safe
                | BlockNumberOrTag::Finalized => Ok(BlockRef::Number(head)),
                BlockNumberOrTag::Earliest => Ok(BlockRef::Number(0)),
                BlockNumberOrTag::Pending => Ok(BlockRef::Pending),
                BlockNumberOrTag::Number(n) if n <= head => Ok(BlockRef::Number(n)),
                BlockNumberOrTag::Number(n) => {
                    Err(simnode_ledger::LedgerError::UnknownBlockNumber(n).into())
                }
            },
            BlockId::Hash(hash) => state
                .ledger
                .block_by_hash(hash.block_hash)
                .map(|b| BlockRef::Number(b.number()))
                .ok_or_else(|| {
                    simnode_ledger::LedgerError::UnknownBlockHash(hash.block_hash).into()
                }),
        }
    }

    /// Resolve a block tag against the current head.
    pub fn resolve_block_ref(&self, id: BlockId) -> Result<BlockRef> {
        Self::resolve_ref(&self.inner.chain.lock(), id)
    }

    /// A block formatted for the RPC API, or `None` when absent.
    pub fn block_by_id(&self, id: BlockId, full: bool) -> Result<Option<Block>> {
        let state = self.inner.chain.lock();
        let number = match Self::resolve_ref(&state, id) {
            Ok(BlockRef::Number(n)) => n,
            // There is no materialized pending block; report the head.
            Ok(BlockRef::Pending) => state.ledger.head_number().unwrap_or_default(),
            Err(NodeError::Ledger(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(state.ledger.block_by_number(number).map(|block| {
            let td = state.ledger.total_difficulty(block.hash).unwrap_or_default();
            block.to_rpc(td, full)
        }))
    }

    /// Number of transactions in the identified block.
    pub fn block_transaction_count(&self, id: BlockId) -> Result<Option<u64>> {
        Ok(self.block_by_id(id, false)?.map(|b| b.transactions.len() as u64))
    }

    /// Current balance of `address`. Historical states are not retained;
    /// any resolvable tag reads the present state.
    pub fn balance(&self, address: Address, id: BlockId) -> Result<U256> {
        let state = self.inner.chain.lock();
        Self::resolve_ref(&state, id)?;
        Ok(state.engine.account(&address).balance)
    }

    /// Transaction count of `address`. The pending tag includes transactions
    /// waiting in the pool.
    pub fn transaction_count(&self, address: Address, id: BlockId) -> Result<u64> {
        let state = self.inner.chain.lock();
        let reference = Self::resolve_ref(&state, id)?;
        let mut nonce = state.engine.account(&address).nonce;
        if reference == BlockRef::Pending {
            nonce += state.pending.iter().filter(|tx| tx.signer() == address).count() as u64;
        }
        Ok(nonce)
    }

    /// Deployed code of `address`.
    pub fn code(&self, address: Address, id: BlockId) -> Result<Bytes> {
        let state = self.inner.chain.lock();
        Self::resolve_ref(&state, id)?;
        Ok(state.engine.account(&address).code)
    }

    /// A storage slot of `address`.
    pub fn storage_at(&self, address: Address, slot: U256, id: BlockId) -> Result<B256> {
        let state = self.inner.chain.lock();
        Self::resolve_ref(&state, id)?;
        Ok(state.engine.account(&address).storage.get(&slot).copied().unwrap_or_default())
    }

    /// A transaction by hash, looking at the pending pool first.
    pub fn transaction_by_hash(&self, hash: B256) -> Option<alloy::rpc::types::Transaction> {
        let state = self.inner.chain.lock();
        if let Some(tx) = state.pending.iter().find(|tx| *tx.inner().tx_hash() == hash) {
            return Some(alloy::rpc::types::Transaction {
                inner: tx.clone(),
                block_hash: None,
                block_number: None,
                transaction_index: None,
                effective_gas_price: Some(tx.inner().effective_gas_price(None)),
            });
        }
        let (block, index) = state.ledger.transaction(hash)?;
        block.rpc_transaction(index)
    }

    /// A transaction by block tag and index.
    pub fn transaction_by_block_and_index(
        &self,
        id: BlockId,
        index: usize,
    ) -> Result<Option<alloy::rpc::types::Transaction>> {
        let state = self.inner.chain.lock();
        let number = match Self::resolve_ref(&state, id) {
            Ok(BlockRef::Number(n)) => n,
            Ok(BlockRef::Pending) => return Ok(None),
            Err(NodeError::Ledger(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(state.ledger.block_by_number(number).and_then(|b| b.rpc_transaction(index)))
    }

    /// The receipt of a mined transaction.
    pub fn transaction_receipt(&self, hash: B256) -> Option<TransactionReceipt> {
        self.inner.chain.lock().ledger.receipt(hash).map(|r| r.to_rpc())
    }

    /// All receipts of the identified block.
    pub fn block_receipts(&self, id: BlockId) -> Result<Option<Vec<TransactionReceipt>>> {
        let state = self.inner.chain.lock();
        let number = match Self::resolve_ref(&state, id) {
            Ok(BlockRef::Number(n)) => n,
            Ok(BlockRef::Pending) => return Ok(None),
            Err(NodeError::Ledger(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(block) = state.ledger.block_by_number(number) else { return Ok(None) };
        Ok(state
            .ledger
            .receipts_for_block(block.hash)
            .map(|rs| rs.iter().map(|r| r.to_rpc()).collect()))
    }

    /// Transactions accepted but not yet mined.
    pub fn pending_transactions(&self) -> Vec<alloy::rpc::types::Transaction> {
        let state = self.inner.chain.lock();
        state
            .pending
            .iter()
            .map(|tx| alloy::rpc::types::Transaction {
                inner: tx.clone(),
                block_hash: None,
                block_number: None,
                transaction_index: None,
                effective_gas_price: Some(tx.inner().effective_gas_price(None)),
            })
            .collect()
    }

    /// Logs matching `filter`.
    pub fn logs(&self, filter: Filter) -> Result<Vec<Log>> {
        let criteria = LogCriteria::new(filter);
        self.inner.chain.lock().ledger.logs(&criteria).map_err(Into::into)
    }

    /// Evaluate a call against current state.
    pub fn call(&self, request: &TransactionRequest, id: BlockId) -> Result<Bytes> {
        let state = self.inner.chain.lock();
        Self::resolve_ref(&state, id)?;
        let outcome = state.engine.simulate(request);
        if !outcome.success && self.inner.config.throw_on_call_failures {
            return Err(NodeError::CallFailed);
        }
        Ok(outcome.output)
    }

    /// Estimate the gas a transaction would consume.
    pub fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64> {
        let state = self.inner.chain.lock();
        Ok(state.engine.simulate(request).gas_used)
    }

    /// The suggested gas price: next base fee plus the suggested tip, or a
    /// flat legacy price before London.
    pub fn gas_price(&self) -> u128 {
        if !self.inner.config.hardfork.supports_eip1559() {
            return LEGACY_GAS_PRICE;
        }
        let state = self.inner.chain.lock();
        let next = state
            .ledger
            .head_block()
            .map(|b| self.next_base_fee(&b.header))
            .unwrap_or(self.inner.config.initial_base_fee);
        next as u128 + SUGGESTED_PRIORITY_FEE
    }

    /// The suggested priority fee.
    pub const fn max_priority_fee_per_gas(&self) -> u128 {
        SUGGESTED_PRIORITY_FEE
    }

    fn next_base_fee(&self, parent: &Header) -> u64 {
        match parent.base_fee_per_gas {
            Some(base_fee) => calc_next_block_base_fee(
                parent.gas_used,
                parent.gas_limit,
                base_fee,
                BaseFeeParams::ethereum(),
            ),
            None => self.inner.config.initial_base_fee,
        }
    }

    /// Accept a raw signed transaction, mining it immediately when automining.
    #[instrument(skip_all, fields(hash))]
    pub fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let envelope = TxEnvelope::decode_2718(&mut &raw[..])?;

        let tx_type = envelope.tx_type() as u8;
        if let Some(minimum) = Hardfork::required_for_tx_type(tx_type) {
            if self.inner.config.hardfork < minimum {
                let feature = match tx_type {
                    1 => "access-list transactions",
                    2 => "fee-market transactions",
                    3 => "blob transactions",
                    _ => "set-code transactions",
                };
                return Err(NodeError::HardforkRequired { feature, minimum });
            }
        }
        if let Some(chain_id) = envelope.chain_id() {
            if chain_id != self.inner.config.chain_id {
                return Err(NodeError::ChainIdMismatch {
                    expected: self.inner.config.chain_id,
                    got: chain_id,
                });
            }
        }

        let recovered = envelope.try_into_recovered()?;
        let hash = *recovered.inner().tx_hash();
        tracing::Span::current().record("hash", tracing::field::display(hash));

        let mut state = self.inner.chain.lock();
        state.pending.push(recovered);
        self.inner.filters.notify_pending_transaction(hash);
        let _ = self.inner.pending_notifications.send(hash);
        debug!("accepted transaction into pool");

        if state.automine {
            let (_, receipts) = self.mine_locked(&mut state);
            if self.inner.config.throw_on_transaction_failures
                && receipts.iter().any(|r| r.transaction_hash == hash && !r.status)
            {
                // The block stands; the error just carries the hash back.
                return Err(NodeError::TransactionFailed { hash });
            }
        }
        Ok(hash)
    }

    /// Fill, sign and accept a transaction from a locally controlled account.
    ///
    /// Unlike the raw path, the node fills what the caller omitted: nonce
    /// from the pending count, gas from an estimate, fees from the current
    /// suggestions. The filled transaction then takes the raw path, so it is
    /// validated, pooled and mined exactly like one submitted pre-signed.
    pub fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
        let from = tx
            .from
            .ok_or_else(|| NodeError::InvalidInput("transaction is missing `from`".to_owned()))?;
        let signer = self
            .inner
            .keystore
            .signer(&from)
            .ok_or(NodeError::UnknownAccount(from))?;

        let legacy = tx.gas_price.is_some();
        let market = tx.max_fee_per_gas.is_some() || tx.max_priority_fee_per_gas.is_some();
        let set_code = tx.authorization_list.is_some();
        if legacy && (market || set_code) {
            return Err(NodeError::InvalidArguments(
                "`gasPrice` cannot be combined with EIP-1559 fee fields".to_owned(),
            ));
        }
        if market && !self.inner.config.hardfork.supports_eip1559() {
            return Err(NodeError::HardforkRequired {
                feature: "fee-market transactions",
                minimum: Hardfork::London,
            });
        }
        if tx.access_list.is_some() && !self.inner.config.hardfork.supports_access_lists() {
            return Err(NodeError::HardforkRequired {
                feature: "access-list transactions",
                minimum: Hardfork::Berlin,
            });
        }
        if set_code && !self.inner.config.hardfork.supports_set_code() {
            return Err(NodeError::HardforkRequired {
                feature: "set-code transactions",
                minimum: Hardfork::Prague,
            });
        }
        if let Some(got) = tx.chain_id {
            if got != self.inner.config.chain_id {
                return Err(NodeError::ChainIdMismatch {
                    expected: self.inner.config.chain_id,
                    got,
                });
            }
        }

        let chain_id = self.inner.config.chain_id;
        let nonce = match tx.nonce {
            Some(nonce) => nonce,
            None => self.transaction_count(from, BlockId::pending())?,
        };
        let gas_limit = match tx.gas {
            Some(gas) => gas,
            None => self.estimate_gas(&tx)?,
        };
        let to = tx.to.unwrap_or(TxKind::Create);
        let value = tx.value.unwrap_or_default();
        let input = tx.input.clone().into_input().unwrap_or_default();

        // Without an explicit fee scheme the fee market wins where active.
        let use_market = market || (!legacy && self.inner.config.hardfork.supports_eip1559());
        let envelope: TxEnvelope = if let Some(authorization_list) = tx.authorization_list.clone()
        {
            let TxKind::Call(to) = to else {
                return Err(NodeError::InvalidInput(
                    "set-code transactions require a `to` address".to_owned(),
                ));
            };
            let mut unsigned = TxEip7702 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_else(|| self.gas_price()),
                max_priority_fee_per_gas: tx
                    .max_priority_fee_per_gas
                    .unwrap_or(SUGGESTED_PRIORITY_FEE),
                to,
                value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                authorization_list,
                input,
            };
            let signature =
                signer.sign_transaction_sync(&mut unsigned).map_err(ProviderError::Signer)?;
            unsigned.into_signed(signature).into()
        } else if use_market {
            let mut unsigned = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_else(|| self.gas_price()),
                max_priority_fee_per_gas: tx
                    .max_priority_fee_per_gas
                    .unwrap_or(SUGGESTED_PRIORITY_FEE),
                to,
                value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                input,
            };
            let signature =
                signer.sign_transaction_sync(&mut unsigned).map_err(ProviderError::Signer)?;
            unsigned.into_signed(signature).into()
        } else if let Some(access_list) = tx.access_list.clone() {
            let mut unsigned = TxEip2930 {
                chain_id,
                nonce,
                gas_price: tx.gas_price.unwrap_or_else(|| self.gas_price()),
                gas_limit,
                to,
                value,
                access_list,
                input,
            };
            let signature =
                signer.sign_transaction_sync(&mut unsigned).map_err(ProviderError::Signer)?;
            unsigned.into_signed(signature).into()
        } else {
            let mut unsigned = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price: tx.gas_price.unwrap_or_else(|| self.gas_price()),
                gas_limit,
                to,
                value,
                input,
            };
            let signature =
                signer.sign_transaction_sync(&mut unsigned).map_err(ProviderError::Signer)?;
            unsigned.into_signed(signature).into()
        };

        self.send_raw_transaction(&envelope.encoded_2718())
    }

    /// Sign an EIP-191 personal message with a locally controlled account.
    pub fn sign_message(&self, address: Address, message: &[u8]) -> Result<Signature> {
        let signer = self
            .inner
            .keystore
            .signer(&address)
            .ok_or(NodeError::UnknownAccount(address))?;
        signer.sign_message_sync(message).map_err(|e| ProviderError::Signer(e).into())
    }

    /// Sign EIP-712 typed data with a locally controlled account.
    pub fn sign_typed_data(&self, address: Address, data: &TypedData) -> Result<Signature> {
        let signer = self
            .inner
            .keystore
            .signer(&address)
            .ok_or(NodeError::UnknownAccount(address))?;
        signer
            .sign_dynamic_typed_data_sync(data)
            .map_err(|e| ProviderError::Signer(e).into())
    }

    /// Mine one block from the pending pool (empty blocks allowed).
    pub fn mine_block(&self) -> Arc<MinedBlock> {
        let mut state = self.inner.chain.lock();
        self.mine_locked(&mut state).0
    }

    /// Assemble, execute and append a block. Caller holds the chain lock.
    fn mine_locked(
        &self,
        state: &mut ChainState,
    ) -> (Arc<MinedBlock>, Vec<Arc<MinedReceipt>>) {
        let parent = state.ledger.head_block().expect("genesis block always present");
        let parent_td = state.ledger.total_difficulty(parent.hash).unwrap_or_default();
        let number = parent.number() + 1;
        let base_fee =
            self.inner.config.hardfork.supports_eip1559().then(|| self.next_base_fee(&parent.header));
        let timestamp = unix_now().max(parent.header.timestamp + 1);

        let transactions = std::mem::take(&mut state.pending);

        // First pass: execute everything and fold the block-level totals.
        let mut outcomes = Vec::with_capacity(transactions.len());
        let mut gas_used = 0u64;
        let mut logs_bloom = Bloom::default();
        for tx in &transactions {
            let price = tx.inner().effective_gas_price(base_fee);
            let outcome = state.engine.execute(tx, price);
            gas_used += outcome.gas_used;
            for log in &outcome.logs {
                logs_bloom.accrue_log(log);
            }
            outcomes.push(outcome);
        }

        let header = Header {
            parent_hash: parent.hash,
            number,
            gas_limit: self.inner.config.block_gas_limit,
            gas_used,
            timestamp,
            base_fee_per_gas: base_fee,
            beneficiary: self.inner.config.coinbase,
            logs_bloom,
            ..Default::default()
        };
        let block = Arc::new(MinedBlock::seal(header, transactions));

        // Second pass: receipts carry provenance of the sealed block.
        let mut receipts = Vec::with_capacity(outcomes.len());
        let mut cumulative = 0u64;
        let mut log_count = 0usize;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let receipt = MinedReceipt::build(
                &block.transactions[index],
                block.hash,
                number,
                timestamp,
                base_fee,
                index as u64,
                outcome.success,
                outcome.gas_used,
                cumulative,
                log_count,
                outcome.logs,
            );
            cumulative = receipt.cumulative_gas_used;
            log_count += receipt.logs.len();
            receipts.push(Arc::new(receipt));
        }

        state.ledger.add_block(block.clone(), parent_td);
        state.ledger.add_receipts(receipts.iter().cloned());

        // Filters accumulate inside the lock, push delivery rides the channel.
        self.inner.filters.notify_block(&block, &receipts);
        let _ = self
            .inner
            .notifications
            .send(ChainNotification { block: block.clone(), receipts: receipts.clone() });

        debug!(number, hash = %block.hash, txs = block.transactions.len(), "mined block");
        (block, receipts)
    }

    /// Record a snapshot of the current head, returning its id.
    pub fn snapshot(&self) -> u64 {
        let mut state = self.inner.chain.lock();
        let id = state.next_snapshot_id;
        state.next_snapshot_id += 1;
        let head = state.ledger.head_number().unwrap_or_default();
        state.snapshots.push(Snapshot { id, head });
        id
    }

    /// Discard every block mined after the identified snapshot.
    ///
    /// Returns false for unknown (or already consumed) snapshot ids. The
    /// snapshot itself and all later ones are consumed. Accumulated filter
    /// results are not retracted.
    pub fn revert_to_snapshot(&self, id: u64) -> bool {
        let mut state = self.inner.chain.lock();
        let Some(position) = state.snapshots.iter().position(|s| s.id == id) else {
            return false;
        };
        let snapshot = state.snapshots[position];
        state.snapshots.truncate(position);

        while let Some(head) = state.ledger.head_number() {
            if head <= snapshot.head {
                break;
            }
            let hash = state.ledger.head_block().expect("head exists").hash;
            state.ledger.remove_block(hash);
        }
        state.pending.clear();
        debug!(id, head = snapshot.head, "reverted to snapshot");
        true
    }

    /// Implements `eth_feeHistory` over the local chain.
    pub fn fee_history(
        &self,
        mut block_count: u64,
        newest: BlockNumberOrTag,
        reward_percentiles: Option<Vec<f64>>,
    ) -> Result<FeeHistory> {
        if block_count == 0 {
            return Ok(FeeHistory::default());
        }
        block_count = block_count.min(MAX_FEE_HISTORY);

        if let Some(percentiles) = &reward_percentiles {
            if percentiles.iter().any(|p| !(0.0..=100.0).contains(p))
                || percentiles.windows(2).any(|w| w[0] > w[1])
            {
                return Err(NodeError::InvalidInput(
                    "reward percentiles must be monotonically increasing and in [0, 100]"
                        .to_owned(),
                ));
            }
        }

        let state = self.inner.chain.lock();
        let end_block = match Self::resolve_ref(&state, BlockId::Number(newest))? {
            // No fee history exists for the pending block; cap at the head.
            BlockRef::Pending => state.ledger.head_number().unwrap_or_default(),
            BlockRef::Number(n) => n,
        };
        if end_block + 1 < block_count {
            block_count = end_block + 1;
        }
        let start_block = end_block + 1 - block_count;

        let mut base_fee_per_gas: Vec<u128> = Vec::new();
        let mut gas_used_ratio: Vec<f64> = Vec::new();
        let mut rewards: Vec<Vec<u128>> = Vec::new();

        for number in start_block..=end_block {
            let block = state
                .ledger
                .block_by_number(number)
                .ok_or(simnode_ledger::LedgerError::UnknownBlockNumber(number))?;
            let header = &block.header;
            base_fee_per_gas.push(header.base_fee_per_gas.unwrap_or_default() as u128);
            gas_used_ratio.push(header.gas_used as f64 / header.gas_limit as f64);

            if let Some(percentiles) = &reward_percentiles {
                let receipts = state.ledger.receipts_for_block(block.hash).unwrap_or_default();
                rewards.push(reward_percentiles_for_block(
                    percentiles,
                    header.gas_used,
                    header.base_fee_per_gas.unwrap_or_default(),
                    &receipts,
                ));
            }
        }

        // One extra entry: the base fee of the block after the newest.
        let newest_header =
            state.ledger.block_by_number(end_block).expect("just iterated").header.clone();
        base_fee_per_gas.push(self.next_base_fee(&newest_header) as u128);

        let base_fee_per_blob_gas = vec![0; base_fee_per_gas.len()];
        let blob_gas_used_ratio = vec![0.; gas_used_ratio.len()];

        Ok(FeeHistory {
            base_fee_per_gas,
            gas_used_ratio,
            base_fee_per_blob_gas,
            blob_gas_used_ratio,
            oldest_block: start_block,
            reward: reward_percentiles.map(|_| rewards),
        })
    }
}

/// Approximate per-percentile rewards for one block: transactions sorted by
/// effective tip, picked by cumulative gas-used thresholds.
fn reward_percentiles_for_block(
    percentiles: &[f64],
    block_gas_used: u64,
    base_fee: u64,
    receipts: &[Arc<MinedReceipt>],
) -> Vec<u128> {
    if receipts.is_empty() || block_gas_used == 0 {
        return vec![0; percentiles.len()];
    }

    let mut tips: Vec<(u128, u64)> = receipts
        .iter()
        .map(|r| (r.effective_gas_price.saturating_sub(base_fee as u128), r.gas_used))
        .collect();
    tips.sort_unstable_by_key(|(tip, _)| *tip);

    percentiles
        .iter()
        .map(|percentile| {
            let threshold = (block_gas_used as f64 * percentile / 100.0) as u64;
            let mut cumulative = 0u64;
            for (tip, gas) in &tips {
                cumulative += gas;
                if cumulative >= threshold {
                    return *tip;
                }
            }
            tips.last().map(|(tip, _)| *tip).unwrap_or_default()
        })
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
