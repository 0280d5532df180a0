//! Server-side filters with accumulator semantics.
//!
//! Every installed filter receives matching events at mining time: the node
//! calls [`FilterRegistry::notify_block`] while still holding the chain lock,
//! so appends are never interleaved with a concurrent mine. Polling drains
//! the accumulator atomically (the shard lock covers the swap), which makes
//! consecutive drains disjoint by construction.
//!
//! Idle polling filters are swept periodically; a filter's deadline refreshes
//! on every poll, never on append. Block removal during a revert does not
//! retract already-accumulated results.

use alloy::{
    primitives::{B256, U64},
    rpc::types::{Filter, Log},
};
use dashmap::DashMap;
use simnode_ledger::{LogCriteria, MinedBlock, MinedReceipt};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};
use tracing::trace;

type FilterId = U64;

/// What a filter is interested in.
#[derive(Debug, Clone)]
pub enum InterestKind {
    /// Logs matching criteria.
    Log(Box<LogCriteria>),
    /// Hashes of newly mined blocks.
    Block,
    /// Hashes of newly accepted pending transactions.
    PendingTransaction,
}

impl InterestKind {
    /// Fallible cast to log criteria.
    pub const fn as_criteria(&self) -> Option<&LogCriteria> {
        match self {
            Self::Log(criteria) => Some(criteria),
            _ => None,
        }
    }

    /// An empty accumulator of the matching shape.
    pub const fn empty_output(&self) -> FilterOutput {
        match self {
            Self::Log(_) => FilterOutput::Log(VecDeque::new()),
            Self::Block | Self::PendingTransaction => FilterOutput::Hash(VecDeque::new()),
        }
    }
}

/// Accumulated, not-yet-drained filter results.
///
/// Serializes as a bare JSON array of logs or hashes, as `getFilterChanges`
/// expects.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum FilterOutput {
    /// Accumulated logs.
    Log(VecDeque<Log>),
    /// Accumulated block or transaction hashes.
    Hash(VecDeque<B256>),
}

impl FilterOutput {
    /// Number of accumulated entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Log(logs) => logs.len(),
            Self::Hash(hashes) => hashes.len(),
        }
    }

    /// True when nothing is accumulated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_log(&mut self, log: Log) {
        match self {
            Self::Log(logs) => logs.push_back(log),
            Self::Hash(_) => unreachable!("log pushed into a hash filter"),
        }
    }

    fn push_hash(&mut self, hash: B256) {
        match self {
            Self::Hash(hashes) => hashes.push_back(hash),
            Self::Log(_) => unreachable!("hash pushed into a log filter"),
        }
    }
}

#[derive(Debug)]
struct ActiveFilter {
    kind: InterestKind,
    buffer: FilterOutput,
    last_poll: Instant,
}

impl ActiveFilter {
    fn new(kind: InterestKind) -> Self {
        let buffer = kind.empty_output();
        Self { kind, buffer, last_poll: Instant::now() }
    }

    /// Swap the accumulator for an empty one and refresh the deadline.
    fn drain(&mut self) -> FilterOutput {
        self.last_poll = Instant::now();
        std::mem::replace(&mut self.buffer, self.kind.empty_output())
    }

    fn idle_for(&self) -> Duration {
        self.last_poll.elapsed()
    }
}

#[derive(Debug)]
struct FilterRegistryInner {
    // Ids start at 1; 0 is awkward in quantity encoding.
    next_id: AtomicU64,
    filters: DashMap<FilterId, ActiveFilter>,
}

impl FilterRegistryInner {
    fn new() -> Self {
        Self { next_id: AtomicU64::new(1), filters: DashMap::new() }
    }

    fn clean_stale(&self, older_than: Duration) {
        self.filters.retain(|id, filter| {
            let keep = filter.idle_for() < older_than;
            if !keep {
                trace!(%id, "removing idle filter");
            }
            keep
        });
    }
}

/// Tracks active filters and their accumulators.
///
/// Filter ids are assigned sequentially starting from 1 and never reused.
/// [`Self::new`] spawns a sweeper that removes filters unpolled for longer
/// than the idle timeout; the sweeper runs on a dedicated thread to stay out
/// of [`DashMap::retain`]'s deadlock conditions.
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    inner: Arc<FilterRegistryInner>,
}

impl FilterRegistry {
    /// Create a registry and spawn its idle sweeper.
    pub fn new(sweep_interval: Duration, idle_timeout: Duration) -> Self {
        let inner = Arc::new(FilterRegistryInner::new());
        FilterSweepTask::new(Arc::downgrade(&inner), sweep_interval, idle_timeout).spawn();
        Self { inner }
    }

    /// Install a filter of the given kind, returning its id.
    pub fn install(&self, kind: InterestKind) -> FilterId {
        let id = FilterId::from(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.inner.filters.insert(id, ActiveFilter::new(kind));
        id
    }

    /// Install a log filter from wire criteria.
    pub fn install_log_filter(&self, filter: Filter) -> FilterId {
        self.install(InterestKind::Log(Box::new(LogCriteria::new(filter))))
    }

    /// Install a new-block filter.
    pub fn install_block_filter(&self) -> FilterId {
        self.install(InterestKind::Block)
    }

    /// Install a pending-transaction filter.
    pub fn install_pending_tx_filter(&self) -> FilterId {
        self.install(InterestKind::PendingTransaction)
    }

    /// Remove a filter. Returns whether the id was installed, so removing an
    /// unknown id is a `false` rather than an error.
    pub fn uninstall(&self, id: FilterId) -> bool {
        self.inner.filters.remove(&id).is_some()
    }

    /// Atomically take everything accumulated since the last drain.
    ///
    /// Returns `None` for unknown ids. Two consecutive drains are disjoint;
    /// the second returns an empty output unless a block was mined between
    /// them.
    pub fn drain(&self, id: FilterId) -> Option<FilterOutput> {
        self.inner.filters.get_mut(&id).map(|mut filter| filter.drain())
    }

    /// The wire criteria of a log filter, for `getFilterLogs`. Refreshes the
    /// deadline like a poll.
    pub fn log_criteria(&self, id: FilterId) -> Option<Filter> {
        let mut entry = self.inner.filters.get_mut(&id)?;
        entry.last_poll = Instant::now();
        entry.kind.as_criteria().map(|c| c.filter().clone())
    }

    /// Append a mined block's events to every interested accumulator.
    ///
    /// Called under the chain lock, so appends never race a concurrent mine.
    pub fn notify_block(&self, block: &MinedBlock, receipts: &[Arc<MinedReceipt>]) {
        for mut entry in self.inner.filters.iter_mut() {
            let ActiveFilter { kind, buffer, .. } = entry.value_mut();
            match kind {
                InterestKind::Block => buffer.push_hash(block.hash),
                InterestKind::Log(criteria) => {
                    if !criteria.bloom_candidate(block.header.logs_bloom) {
                        continue;
                    }
                    for receipt in receipts {
                        for log in receipt.logs.iter().filter(|l| criteria.matches_log(&l.inner)) {
                            buffer.push_log(log.clone());
                        }
                    }
                }
                InterestKind::PendingTransaction => {}
            }
        }
    }

    /// Append a newly accepted pending transaction hash.
    pub fn notify_pending_transaction(&self, hash: B256) {
        for mut entry in self.inner.filters.iter_mut() {
            let ActiveFilter { kind, buffer, .. } = entry.value_mut();
            if matches!(kind, InterestKind::PendingTransaction) {
                buffer.push_hash(hash);
            }
        }
    }

    /// Number of installed filters.
    pub fn len(&self) -> usize {
        self.inner.filters.len()
    }

    /// True when no filter is installed.
    pub fn is_empty(&self) -> bool {
        self.inner.filters.is_empty()
    }

    #[cfg(test)]
    fn sweep(&self, older_than: Duration) {
        self.inner.clean_stale(older_than);
    }
}

/// Periodically removes filters that have not been polled in a while.
#[derive(Debug)]
struct FilterSweepTask {
    registry: Weak<FilterRegistryInner>,
    sleep: Duration,
    idle_timeout: Duration,
}

impl FilterSweepTask {
    const fn new(
        registry: Weak<FilterRegistryInner>,
        sleep: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self { registry, sleep, idle_timeout }
    }

    /// Run on a dedicated thread; exits when the registry is dropped.
    fn spawn(self) {
        std::thread::spawn(move || loop {
            std::thread::sleep(self.sleep);
            match self.registry.upgrade() {
                Some(registry) => registry.clean_stale(self.idle_timeout),
                None => break,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        consensus::Header,
        primitives::{Address, Bloom},
    };

    fn registry() -> FilterRegistry {
        FilterRegistry::new(Duration::from_secs(3600), Duration::from_secs(3600))
    }

    fn block_with_bloom(number: u64, bloom: Bloom) -> MinedBlock {
        let header = Header { number, logs_bloom: bloom, ..Default::default() };
        MinedBlock::seal(header, vec![])
    }

    #[test]
    fn drains_are_disjoint() {
        let registry = registry();
        let id = registry.install_block_filter();

        registry.notify_block(&block_with_bloom(1, Bloom::default()), &[]);
        let first = registry.drain(id).unwrap();
        assert_eq!(first.len(), 1);

        let second = registry.drain(id).unwrap();
        assert!(second.is_empty());

        registry.notify_block(&block_with_bloom(2, Bloom::default()), &[]);
        let third = registry.drain(id).unwrap();
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn uninstall_unknown_id_is_false() {
        let registry = registry();
        assert!(!registry.uninstall(U64::from(42)));

        let id = registry.install_block_filter();
        assert!(registry.uninstall(id));
        assert!(!registry.uninstall(id));
        assert!(registry.drain(id).is_none());
    }

    #[test]
    fn log_filters_only_accumulate_matches() {
        let registry = registry();
        let wanted = Address::repeat_byte(0xaa);
        let id = registry.install_log_filter(Filter::new().address(wanted));

        let matching = alloy::primitives::Log {
            address: wanted,
            data: alloy::primitives::LogData::new_unchecked(vec![], Default::default()),
        };
        let mut bloom = Bloom::default();
        bloom.accrue_log(&matching);

        let log = Log { inner: matching, block_number: Some(1), ..Default::default() };
        let receipt = Arc::new(MinedReceipt {
            transaction_hash: B256::repeat_byte(0x01),
            transaction_index: 0,
            block_hash: B256::repeat_byte(0x02),
            block_number: 1,
            status: true,
            gas_used: 21_000,
            cumulative_gas_used: 21_000,
            logs_bloom: bloom,
            logs: vec![log],
            from: Address::repeat_byte(0x01),
            to: Some(wanted),
            contract_address: None,
            effective_gas_price: 1,
            tx_type: 0,
        });

        registry.notify_block(&block_with_bloom(1, bloom), &[receipt.clone()]);
        // A block whose bloom cannot match is skipped entirely.
        registry.notify_block(&block_with_bloom(2, Bloom::default()), &[receipt]);

        let drained = registry.drain(id).unwrap();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn idle_filters_are_swept_fresh_ones_kept() {
        let registry = registry();
        let stale = registry.install_block_filter();
        let fresh = registry.install_block_filter();

        std::thread::sleep(Duration::from_millis(30));
        registry.drain(fresh).unwrap();
        registry.sweep(Duration::from_millis(20));

        assert!(registry.drain(stale).is_none());
        assert!(registry.drain(fresh).is_some());
    }

    #[test]
    fn pending_tx_hashes_reach_only_pending_filters() {
        let registry = registry();
        let pending = registry.install_pending_tx_filter();
        let blocks = registry.install_block_filter();

        registry.notify_pending_transaction(B256::repeat_byte(0x11));

        assert_eq!(registry.drain(pending).unwrap().len(), 1);
        assert!(registry.drain(blocks).unwrap().is_empty());
    }
}
