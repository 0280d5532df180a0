//! Bloom pre-filtering and literal log matching.
//!
//! Criteria arrive in the wire shape of `eth_getLogs` / `eth_newFilter`
//! ([`alloy::rpc::types::Filter`]), already normalized so that a bare address
//! or topic is a singleton set. [`LogCriteria`] precomputes the per-value
//! blooms once; the bloom test is a necessary-but-not-sufficient pre-filter,
//! and every bloom hit is confirmed by literal comparison.

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Bloom, B256},
    rpc::types::{BloomFilter, Filter, FilterBlockOption, FilteredParams, Log},
};

/// Normalized, bloom-accelerated log query criteria.
#[derive(Debug, Clone)]
pub struct LogCriteria {
    filter: Filter,
    address_blooms: BloomFilter,
    topic_blooms: Vec<BloomFilter>,
}

impl LogCriteria {
    /// Normalize a wire filter into matchable criteria.
    pub fn new(filter: Filter) -> Self {
        let address_blooms = FilteredParams::address_filter(&filter.address);
        let topic_blooms = FilteredParams::topics_filter(&filter.topics);
        Self { filter, address_blooms, topic_blooms }
    }

    /// The wire filter these criteria were built from.
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The single-block hash target, if this is an EIP-234 style query.
    pub fn at_block_hash(&self) -> Option<B256> {
        match self.filter.block_option {
            FilterBlockOption::AtBlockHash(hash) => Some(hash),
            FilterBlockOption::Range { .. } => None,
        }
    }

    /// The requested block range. `None` entries default to "latest" and are
    /// resolved against the head at evaluation time, never at creation time.
    pub fn range(&self) -> (Option<BlockNumberOrTag>, Option<BlockNumberOrTag>) {
        match self.filter.block_option {
            FilterBlockOption::Range { from_block, to_block } => (from_block, to_block),
            FilterBlockOption::AtBlockHash(_) => (None, None),
        }
    }

    /// Bloom membership pre-filter.
    ///
    /// Returns true iff at least one candidate address tests positive
    /// (vacuously true with no address constraint) and, for every constrained
    /// topic position, at least one accepted value tests positive. May admit
    /// false positives; never produces a false negative.
    pub fn bloom_candidate(&self, bloom: Bloom) -> bool {
        FilteredParams::matches_address(bloom, &self.address_blooms)
            && FilteredParams::matches_topics(bloom, &self.topic_blooms)
    }

    /// Literal address + topic match against a single log.
    ///
    /// A topic position constrained by the criteria but absent from the log
    /// is a non-match; unconstrained positions are skipped.
    pub fn matches_log(&self, log: &alloy::primitives::Log) -> bool {
        if !self.filter.address.matches(&log.address) {
            return false;
        }
        for (position, accepted) in self.filter.topics.iter().enumerate() {
            if accepted.is_empty() {
                continue;
            }
            match log.topics().get(position) {
                Some(topic) if accepted.matches(topic) => {}
                _ => return false,
            }
        }
        true
    }
}

impl From<Filter> for LogCriteria {
    fn from(filter: Filter) -> Self {
        Self::new(filter)
    }
}

/// Keep the logs that literally match `criteria` within the resolved
/// `[from, to]` block range (inclusive).
pub fn filter_logs(logs: &[Log], criteria: &LogCriteria, from: u64, to: u64) -> Vec<Log> {
    logs.iter()
        .filter(|log| {
            log.block_number.is_some_and(|n| n >= from && n <= to)
                && criteria.matches_log(&log.inner)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, LogData};

    fn raw_log(address: Address, topics: Vec<B256>) -> alloy::primitives::Log {
        alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(topics, Default::default()),
        }
    }

    fn bloom_for(log: &alloy::primitives::Log) -> Bloom {
        let mut bloom = Bloom::default();
        bloom.accrue_log(log);
        bloom
    }

    #[test]
    fn empty_criteria_match_everything() {
        let criteria = LogCriteria::new(Filter::default());
        let log = raw_log(Address::repeat_byte(0x11), vec![B256::repeat_byte(0x22)]);

        assert!(criteria.matches_log(&log));
        assert!(criteria.bloom_candidate(bloom_for(&log)));
        assert!(criteria.bloom_candidate(Bloom::default()));
    }

    #[test]
    fn address_mismatch_rejected() {
        let wanted = Address::repeat_byte(0xaa);
        let criteria = LogCriteria::new(Filter::new().address(wanted));

        let hit = raw_log(wanted, vec![]);
        let miss = raw_log(Address::repeat_byte(0xbb), vec![]);

        assert!(criteria.matches_log(&hit));
        assert!(!criteria.matches_log(&miss));
        assert!(criteria.bloom_candidate(bloom_for(&hit)));
        assert!(!criteria.bloom_candidate(bloom_for(&miss)));
    }

    #[test]
    fn constrained_topic_beyond_log_topics_is_a_non_match() {
        let t0 = B256::repeat_byte(0x01);
        let t1 = B256::repeat_byte(0x02);
        let criteria =
            LogCriteria::new(Filter::new().event_signature(t0).topic1(t1));

        // Log carries only topic0; the criteria constrain position 1.
        let log = raw_log(Address::repeat_byte(0x11), vec![t0]);
        assert!(!criteria.matches_log(&log));

        let full = raw_log(Address::repeat_byte(0x11), vec![t0, t1]);
        assert!(criteria.matches_log(&full));
    }

    #[test]
    fn unconstrained_positions_are_skipped() {
        let t1 = B256::repeat_byte(0x02);
        let criteria = LogCriteria::new(Filter::new().topic1(t1));

        // topic0 is unconstrained ("any"), topic1 must match.
        let log = raw_log(Address::repeat_byte(0x11), vec![B256::repeat_byte(0x77), t1]);
        assert!(criteria.matches_log(&log));
    }

    #[test]
    fn range_filtering_applied_to_provenance() {
        let criteria = LogCriteria::new(Filter::default());
        let inner = raw_log(Address::repeat_byte(0x11), vec![]);
        let logs: Vec<Log> = (1u64..=5)
            .map(|n| Log {
                inner: inner.clone(),
                block_number: Some(n),
                ..Default::default()
            })
            .collect();

        let kept = filter_logs(&logs, &criteria, 2, 4);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|l| (2..=4).contains(&l.block_number.unwrap())));
    }
}
