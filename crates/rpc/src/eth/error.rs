use alloy::primitives::U64;
use simnode_node::NodeError;

/// Errors surfaced by `eth` namespace handlers.
#[derive(Debug, thiserror::Error)]
pub enum EthError {
    /// The filter id is unknown, already uninstalled, swept for idleness, or
    /// not of the kind the method expects.
    #[error("filter not found: {0}")]
    FilterNotFound(U64),

    /// An error from the node core.
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl EthError {
    /// Convert to the string shape handler results carry on the wire.
    pub fn into_string(self) -> String {
        self.to_string()
    }
}
