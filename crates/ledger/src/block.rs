use alloy::{
    consensus::{
        transaction::Recovered, Header, Receipt, ReceiptEnvelope, ReceiptWithBloom, Transaction,
        TxEnvelope,
    },
    primitives::{Address, Bloom, B256, TxKind},
    rpc::types::{Block, BlockTransactions, Log, TransactionReceipt},
};

/// A block mined by the local node, plus the metadata the RPC surface needs.
///
/// Blocks are immutable once constructed. The ledger stores them behind `Arc`
/// so lookups are cheap clones.
#[derive(Debug, Clone)]
pub struct MinedBlock {
    /// The sealed header.
    pub header: Header,
    /// Hash of the sealed header.
    pub hash: B256,
    /// Transactions in execution order, with recovered senders.
    pub transactions: Vec<Recovered<TxEnvelope>>,
}

impl MinedBlock {
    /// Seal a header and its transactions into a `MinedBlock`.
    pub fn seal(header: Header, transactions: Vec<Recovered<TxEnvelope>>) -> Self {
        let hash = header.hash_slow();
        Self { header, hash, transactions }
    }

    /// The block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// Hash of the transaction at `index`, if any.
    pub fn transaction_hash(&self, index: usize) -> Option<B256> {
        self.transactions.get(index).map(|tx| *tx.inner().tx_hash())
    }

    /// Format the block for the RPC API.
    ///
    /// `full` selects between full transaction objects and bare hashes.
    pub fn to_rpc(&self, total_difficulty: alloy::primitives::U256, full: bool) -> Block {
        let header = alloy::rpc::types::Header {
            hash: self.hash,
            inner: self.header.clone(),
            total_difficulty: Some(total_difficulty),
            size: None,
        };

        let transactions = if full {
            BlockTransactions::Full(
                (0..self.transactions.len()).map(|i| self.rpc_transaction(i).expect("in range")).collect(),
            )
        } else {
            BlockTransactions::Hashes(
                self.transactions.iter().map(|tx| *tx.inner().tx_hash()).collect(),
            )
        };

        Block { header, uncles: Vec::new(), transactions, withdrawals: None }
    }

    /// Format the transaction at `index` for the RPC API.
    pub fn rpc_transaction(&self, index: usize) -> Option<alloy::rpc::types::Transaction> {
        let tx = self.transactions.get(index)?;

        let egp = self
            .header
            .base_fee_per_gas
            .map(|base_fee| {
                tx.inner().effective_tip_per_gas(base_fee).unwrap_or_default() + base_fee as u128
            })
            .unwrap_or_else(|| tx.inner().max_fee_per_gas());

        Some(alloy::rpc::types::Transaction {
            inner: tx.clone(),
            block_hash: Some(self.hash),
            block_number: Some(self.header.number),
            transaction_index: Some(index as u64),
            effective_gas_price: Some(egp),
        })
    }
}

/// The receipt recorded for a mined transaction.
///
/// Logs carry full provenance (block hash/number, transaction hash/index and
/// block-wide log index) so they can be served directly from log queries.
#[derive(Debug, Clone)]
pub struct MinedReceipt {
    /// Hash of the transaction this receipt belongs to.
    pub transaction_hash: B256,
    /// Position of the transaction within its block.
    pub transaction_index: u64,
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Number of the containing block.
    pub block_number: u64,
    /// Execution status (EIP-658).
    pub status: bool,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Running total of gas used within the block, through this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom of this receipt's logs.
    pub logs_bloom: Bloom,
    /// Logs emitted by the transaction, with provenance filled in.
    pub logs: Vec<Log>,
    /// Sender of the transaction.
    pub from: Address,
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Address of the created contract, for creations.
    pub contract_address: Option<Address>,
    /// Effective gas price paid, per EIP-1559 rules.
    pub effective_gas_price: u128,
    /// EIP-2718 type of the transaction.
    pub tx_type: u8,
}

impl MinedReceipt {
    /// Build a receipt for the `index`-th transaction of a block.
    ///
    /// `prior_cumulative_gas` and `prior_log_count` are the block-wide totals
    /// before this transaction; `cumulativeGasUsed` is therefore monotonically
    /// non-decreasing across a block by construction.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        tx: &Recovered<TxEnvelope>,
        block_hash: B256,
        block_number: u64,
        timestamp: u64,
        base_fee: Option<u64>,
        index: u64,
        status: bool,
        gas_used: u64,
        prior_cumulative_gas: u64,
        prior_log_count: usize,
        raw_logs: Vec<alloy::primitives::Log>,
    ) -> Self {
        let transaction_hash = *tx.inner().tx_hash();

        let mut logs_bloom = Bloom::default();
        for log in &raw_logs {
            logs_bloom.accrue_log(log);
        }

        let logs = raw_logs
            .into_iter()
            .enumerate()
            .map(|(tx_log_idx, inner)| Log {
                inner,
                block_hash: Some(block_hash),
                block_number: Some(block_number),
                block_timestamp: Some(timestamp),
                transaction_hash: Some(transaction_hash),
                transaction_index: Some(index),
                log_index: Some((prior_log_count + tx_log_idx) as u64),
                removed: false,
            })
            .collect();

        let (contract_address, to) = match tx.inner().kind() {
            TxKind::Create => (Some(tx.signer().create(tx.inner().nonce())), None),
            TxKind::Call(addr) => (None, Some(addr)),
        };

        Self {
            transaction_hash,
            transaction_index: index,
            block_hash,
            block_number,
            status,
            gas_used,
            cumulative_gas_used: prior_cumulative_gas + gas_used,
            logs_bloom,
            logs,
            from: tx.signer(),
            to,
            contract_address,
            effective_gas_price: tx.inner().effective_gas_price(base_fee),
            tx_type: tx.inner().tx_type() as u8,
        }
    }

    /// Format the receipt for the RPC API.
    pub fn to_rpc(&self) -> TransactionReceipt {
        let receipt = Receipt {
            status: self.status.into(),
            cumulative_gas_used: self.cumulative_gas_used,
            logs: self.logs.clone(),
        };
        let with_bloom = ReceiptWithBloom { receipt, logs_bloom: self.logs_bloom };

        let inner = match self.tx_type {
            1 => ReceiptEnvelope::Eip2930(with_bloom),
            2 => ReceiptEnvelope::Eip1559(with_bloom),
            3 => ReceiptEnvelope::Eip4844(with_bloom),
            4 => ReceiptEnvelope::Eip7702(with_bloom),
            _ => ReceiptEnvelope::Legacy(with_bloom),
        };

        TransactionReceipt {
            inner,
            transaction_hash: self.transaction_hash,
            transaction_index: Some(self.transaction_index),
            block_hash: Some(self.block_hash),
            block_number: Some(self.block_number),
            gas_used: self.gas_used,
            effective_gas_price: self.effective_gas_price,
            blob_gas_used: None,
            blob_gas_price: None,
            from: self.from,
            to: self.to,
            contract_address: self.contract_address,
        }
    }
}

