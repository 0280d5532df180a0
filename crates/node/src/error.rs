use crate::Hardfork;
use alloy::primitives::{Address, B256};
use simnode_ledger::LedgerError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors surfaced by the node core.
///
/// The first two variants mirror the wire-level taxonomy: malformed values
/// versus semantically inconsistent combinations. Methods that are known but
/// intentionally unimplemented are classified at the dispatcher, which never
/// reaches the node for them.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A parameter value is malformed (bad percentile, bad payload).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Parameters are individually valid but mutually inconsistent.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The address is not controlled by the node's key store.
    #[error("unknown account {0}")]
    UnknownAccount(Address),

    /// A feature was used before its activation hardfork.
    #[error("{feature} is not available before the {minimum} hardfork")]
    HardforkRequired {
        /// Human name of the gated feature.
        feature: &'static str,
        /// The first hardfork that enables it.
        minimum: Hardfork,
    },

    /// A mined transaction reported a failure and the node is configured to
    /// surface those. The hash lets send-and-forget callers locate it.
    #[error("transaction {hash} failed")]
    TransactionFailed {
        /// Hash of the failed transaction.
        hash: B256,
    },

    /// A call reverted and the node is configured to surface that.
    #[error("call reverted")]
    CallFailed,

    /// The transaction's chain id does not match the node's.
    #[error("transaction chain id {got} does not match node chain id {expected}")]
    ChainIdMismatch {
        /// The node's chain id.
        expected: u64,
        /// The transaction's chain id.
        got: u64,
    },

    /// A ledger query failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A raw transaction could not be decoded.
    #[error("failed to decode raw transaction: {0}")]
    Decode(#[from] alloy::eips::eip2718::Eip2718Error),

    /// Signature recovery failed on a raw transaction.
    #[error("failed to recover transaction signer: {0}")]
    Recovery(#[from] alloy::consensus::crypto::RecoveryError),

    /// Key derivation failed while constructing the node's accounts.
    #[error(transparent)]
    Keystore(#[from] simnode_provider::ProviderError),
}
