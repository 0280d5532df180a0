use crate::{
    block::{MinedBlock, MinedReceipt},
    filter::LogCriteria,
    util::BlockRangeInclusiveIter,
    LedgerError,
};
use alloy::{
    eips::BlockNumberOrTag,
    primitives::{B256, U256},
    rpc::types::Log,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::trace;

/// The maximum number of blocks we scan at once when handling a range filter.
const MAX_HEADERS_RANGE: u64 = 1_000;

/// Query limits for log scans.
#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    /// Maximum width of a `getLogs` block range.
    pub max_blocks_per_filter: u64,
    /// Maximum number of logs returned from a multi-block query.
    pub max_logs_per_response: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { max_blocks_per_filter: 100_000, max_logs_per_response: 20_000 }
    }
}

/// Where a transaction lives in the chain.
#[derive(Debug, Clone, Copy)]
struct TxLocation {
    block_hash: B256,
    index: usize,
}

/// The authoritative in-memory chain index.
///
/// Four indices are maintained in lockstep: by-number, by-hash, by-contained-
/// transaction-hash, and a parallel cumulative-difficulty map. Receipts are
/// registered separately once execution produces them, and removed together
/// with their block on a revert.
#[derive(Debug, Default)]
pub struct LedgerIndex {
    config: LedgerConfig,
    by_number: BTreeMap<u64, Arc<MinedBlock>>,
    numbers_by_hash: HashMap<B256, u64>,
    tx_locations: HashMap<B256, TxLocation>,
    receipts: HashMap<B256, Arc<MinedReceipt>>,
    total_difficulty: HashMap<B256, U256>,
}

impl LedgerIndex {
    /// Create an empty index with the given query limits.
    pub fn new(config: LedgerConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// The configured query limits.
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The current head block number, if any block has been added.
    pub fn head_number(&self) -> Option<u64> {
        self.by_number.last_key_value().map(|(n, _)| *n)
    }

    /// The current head block.
    pub fn head_block(&self) -> Option<Arc<MinedBlock>> {
        self.by_number.last_key_value().map(|(_, b)| b.clone())
    }

    /// Append a block and its cumulative difficulty.
    ///
    /// Registers every contained transaction in the by-transaction-hash
    /// index. Receipts are recorded separately via [`Self::add_receipts`].
    pub fn add_block(&mut self, block: Arc<MinedBlock>, total_difficulty: U256) {
        for (index, tx) in block.transactions.iter().enumerate() {
            self.tx_locations.insert(
                *tx.inner().tx_hash(),
                TxLocation { block_hash: block.hash, index },
            );
        }
        self.numbers_by_hash.insert(block.hash, block.number());
        self.total_difficulty.insert(block.hash, total_difficulty);
        self.by_number.insert(block.number(), block);
    }

    /// Record the receipts produced for a block's transactions.
    pub fn add_receipts(&mut self, receipts: impl IntoIterator<Item = Arc<MinedReceipt>>) {
        for receipt in receipts {
            self.receipts.insert(receipt.transaction_hash, receipt);
        }
    }

    /// Remove a block, the exact inverse of [`Self::add_block`] plus receipt
    /// deletion. Used only when a locally produced block is discarded.
    pub fn remove_block(&mut self, hash: B256) -> Option<Arc<MinedBlock>> {
        let number = self.numbers_by_hash.remove(&hash)?;
        let block = self.by_number.remove(&number)?;
        self.total_difficulty.remove(&hash);
        for tx in &block.transactions {
            let tx_hash = tx.inner().tx_hash();
            self.tx_locations.remove(tx_hash);
            self.receipts.remove(tx_hash);
        }
        trace!(number, %hash, "removed block from ledger");
        Some(block)
    }

    /// Look up a block by number.
    pub fn block_by_number(&self, number: u64) -> Option<Arc<MinedBlock>> {
        self.by_number.get(&number).cloned()
    }

    /// Look up a block by hash.
    pub fn block_by_hash(&self, hash: B256) -> Option<Arc<MinedBlock>> {
        let number = self.numbers_by_hash.get(&hash)?;
        self.by_number.get(number).cloned()
    }

    /// Look up a transaction by hash, returning its block and index.
    pub fn transaction(&self, hash: B256) -> Option<(Arc<MinedBlock>, usize)> {
        let location = self.tx_locations.get(&hash)?;
        let block = self.block_by_hash(location.block_hash)?;
        Some((block, location.index))
    }

    /// The block containing the given transaction hash.
    pub fn block_by_transaction_hash(&self, hash: B256) -> Option<Arc<MinedBlock>> {
        self.transaction(hash).map(|(block, _)| block)
    }

    /// The receipt recorded for the given transaction hash.
    pub fn receipt(&self, hash: B256) -> Option<Arc<MinedReceipt>> {
        self.receipts.get(&hash).cloned()
    }

    /// All receipts of a block, in transaction order.
    pub fn receipts_for_block(&self, hash: B256) -> Option<Vec<Arc<MinedReceipt>>> {
        let block = self.block_by_hash(hash)?;
        block
            .transactions
            .iter()
            .map(|tx| self.receipts.get(tx.inner().tx_hash()).cloned())
            .collect()
    }

    /// The cumulative difficulty recorded for a block hash.
    pub fn total_difficulty(&self, hash: B256) -> Option<U256> {
        self.total_difficulty.get(&hash).copied()
    }

    /// Canonical block hashes for the inclusive range `[start, end]`.
    pub fn canonical_hashes_range(&self, start: u64, end: u64) -> Vec<B256> {
        self.by_number.range(start..=end).map(|(_, b)| b.hash).collect()
    }

    /// Resolve a range endpoint to a concrete number, against the current
    /// head. "latest" and "pending" resolve at evaluation time.
    fn resolve_endpoint(&self, tag: Option<BlockNumberOrTag>, head: u64) -> u64 {
        match tag {
            Some(BlockNumberOrTag::Number(n)) => n,
            Some(BlockNumberOrTag::Earliest) => 0,
            _ => head,
        }
    }

    /// All logs matching `criteria`, walking `fromBlock..=toBlock`.
    ///
    /// Each block's bloom is tested first; only on a bloom hit are that
    /// block's receipts scanned for literal matches, so the pre-filter can
    /// admit false positives but never drops a literal match.
    pub fn logs(&self, criteria: &LogCriteria) -> Result<Vec<Log>, LedgerError> {
        if let Some(hash) = criteria.at_block_hash() {
            let block = self.block_by_hash(hash).ok_or(LedgerError::UnknownBlockHash(hash))?;
            let number = block.number();
            return self.logs_in_range(criteria, number, number);
        }

        let Some(head) = self.head_number() else { return Ok(Vec::new()) };
        let (from_tag, to_tag) = criteria.range();
        let from = self.resolve_endpoint(from_tag, head);
        let to = self.resolve_endpoint(to_tag, head).min(head);
        self.logs_in_range(criteria, from, to)
    }

    /// All logs in the inclusive `[from, to]` range matching `criteria`.
    pub fn logs_in_range(
        &self,
        criteria: &LogCriteria,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, LedgerError> {
        if to < from {
            return Err(LedgerError::InvalidBlockRange);
        }
        if to - from > self.config.max_blocks_per_filter {
            return Err(LedgerError::QueryExceedsMaxBlocks(self.config.max_blocks_per_filter));
        }

        trace!(from, to, "finding logs in range");

        let is_multi_block_range = from != to;
        let mut all_logs = Vec::new();

        for (chunk_from, chunk_to) in BlockRangeInclusiveIter::new(from..=to, MAX_HEADERS_RANGE) {
            for (_, block) in self.by_number.range(chunk_from..=chunk_to) {
                if !criteria.bloom_candidate(block.header.logs_bloom) {
                    continue;
                }

                for tx in &block.transactions {
                    let Some(receipt) = self.receipts.get(tx.inner().tx_hash()) else { continue };
                    all_logs.extend(
                        receipt.logs.iter().filter(|log| criteria.matches_log(&log.inner)).cloned(),
                    );
                }

                if is_multi_block_range && all_logs.len() > self.config.max_logs_per_response {
                    return Err(LedgerError::QueryExceedsMaxResults {
                        max_logs: self.config.max_logs_per_response,
                        from_block: from,
                        to_block: block.number().saturating_sub(1),
                    });
                }
            }
        }

        Ok(all_logs)
    }
}
