use alloy::primitives::B256;

/// Errors returned by [`LedgerIndex`] queries.
///
/// [`LedgerIndex`]: crate::LedgerIndex
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// `fromBlock` is past `toBlock`, or the range cannot be resolved.
    #[error("invalid block range params")]
    InvalidBlockRange,
    /// The requested range spans more blocks than the configured limit.
    #[error("query exceeds max block range {0}")]
    QueryExceedsMaxBlocks(u64),
    /// The query matched more logs than the configured response limit.
    #[error(
        "query exceeds max results {max_logs}, retry with the range {from_block}-{to_block}"
    )]
    QueryExceedsMaxResults {
        /// The configured result cap.
        max_logs: usize,
        /// First block of the suggested retry range.
        from_block: u64,
        /// Last fully-scanned block.
        to_block: u64,
    },
    /// No block with the given hash is known to the ledger.
    #[error("block not found: {0}")]
    UnknownBlockHash(B256),
    /// No block with the given number is known to the ledger.
    #[error("block not found: #{0}")]
    UnknownBlockNumber(u64),
}
