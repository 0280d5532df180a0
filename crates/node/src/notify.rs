use simnode_ledger::{MinedBlock, MinedReceipt};
use std::sync::Arc;

/// Broadcast to push subscribers after every mined block.
///
/// Carries the sealed block and its receipts behind `Arc`s so fan-out to many
/// subscribers stays cheap.
#[derive(Debug, Clone)]
pub struct ChainNotification {
    /// The newly mined block.
    pub block: Arc<MinedBlock>,
    /// Its receipts, in transaction order.
    pub receipts: Vec<Arc<MinedReceipt>>,
}
