//! Property tests for the bloom pre-filter.
//!
//! The block-level bloom check is allowed to admit false positives, but it
//! must never reject a block containing a literal match.

use alloy::{
    primitives::{Address, Bloom, LogData, B256},
    rpc::types::Filter,
};
use proptest::prelude::*;
use simnode_ledger::LogCriteria;

fn arb_address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from)
}

fn arb_topic() -> impl Strategy<Value = B256> {
    any::<[u8; 32]>().prop_map(B256::from)
}

fn arb_log() -> impl Strategy<Value = alloy::primitives::Log> {
    (arb_address(), proptest::collection::vec(arb_topic(), 0..4)).prop_map(|(address, topics)| {
        alloy::primitives::Log { address, data: LogData::new_unchecked(topics, Default::default()) }
    })
}

fn bloom_of(logs: &[alloy::primitives::Log]) -> Bloom {
    let mut bloom = Bloom::default();
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

proptest! {
    #[test]
    fn literal_match_implies_bloom_candidate(
        logs in proptest::collection::vec(arb_log(), 1..8),
        pick in any::<prop::sample::Index>(),
        constrain_topic in any::<bool>(),
    ) {
        // Build criteria guaranteed to literally match one of the logs.
        let target = pick.get(&logs);
        let mut filter = Filter::new().address(target.address);
        if constrain_topic {
            if let Some(topic0) = target.topics().first() {
                filter = filter.event_signature(*topic0);
            }
        }
        let criteria = LogCriteria::new(filter);

        prop_assert!(criteria.matches_log(target));
        prop_assert!(criteria.bloom_candidate(bloom_of(&logs)));
    }

    #[test]
    fn bloom_miss_implies_no_literal_match(
        logs in proptest::collection::vec(arb_log(), 1..8),
        address in arb_address(),
        topic in arb_topic(),
    ) {
        let criteria = LogCriteria::new(Filter::new().address(address).event_signature(topic));

        if !criteria.bloom_candidate(bloom_of(&logs)) {
            for log in &logs {
                prop_assert!(!criteria.matches_log(log));
            }
        }
    }
}
