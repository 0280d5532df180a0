use crate::{eth::EthError, subs::SubscriptionManager};
use alloy::{
    primitives::U64,
    rpc::types::Log,
};
use simnode_node::{FilterOutput, SimNode};
use std::sync::Arc;

/// RPC context: the node plus the subscription bookkeeping that only the RPC
/// layer cares about.
///
/// Cheap to clone; one instance is shared across all handler invocations.
#[derive(Debug, Clone)]
pub struct RpcCtx {
    inner: Arc<RpcCtxInner>,
}

impl RpcCtx {
    /// Create a context around `node`, spawning the subscription cleaner.
    pub fn new(node: SimNode) -> Self {
        let clean_interval = node.config().filter_sweep_interval;
        let subs = SubscriptionManager::new(node.clone(), clean_interval);
        Self { inner: Arc::new(RpcCtxInner { node, subs }) }
    }
}

impl core::ops::Deref for RpcCtx {
    type Target = RpcCtxInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Inner context for [`RpcCtx`].
#[derive(Debug)]
pub struct RpcCtxInner {
    node: SimNode,
    subs: SubscriptionManager,
}

impl RpcCtxInner {
    /// The node behind this context.
    pub const fn node(&self) -> &SimNode {
        &self.node
    }

    /// The push subscription manager.
    pub const fn subscriptions(&self) -> &SubscriptionManager {
        &self.subs
    }

    /// Drain a polling filter's accumulator, for `eth_getFilterChanges`.
    pub fn filter_changes(&self, id: U64) -> Result<FilterOutput, EthError> {
        self.node.filters().drain(id).ok_or(EthError::FilterNotFound(id))
    }

    /// Re-run a log filter's full query, for `eth_getFilterLogs`. Errors for
    /// unknown ids and for filters that are not log filters.
    pub fn filter_logs(&self, id: U64) -> Result<Vec<Log>, EthError> {
        let filter =
            self.node.filters().log_criteria(id).ok_or(EthError::FilterNotFound(id))?;
        self.node.logs(filter).map_err(Into::into)
    }

    /// The client identification string, for `web3_clientVersion`.
    pub fn client_version(&self) -> String {
        format!("simnode/v{}", env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::types::Filter;
    use simnode_node::NodeConfig;

    fn ctx() -> RpcCtx {
        RpcCtx::new(SimNode::new(NodeConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn filter_changes_errors_on_unknown_ids() {
        let ctx = ctx();
        assert!(matches!(
            ctx.filter_changes(U64::from(7)),
            Err(EthError::FilterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn filter_logs_rejects_non_log_filters() {
        let ctx = ctx();
        let block_filter = ctx.node().filters().install_block_filter();
        assert!(ctx.filter_logs(block_filter).is_err());

        let log_filter = ctx.node().filters().install_log_filter(Filter::default());
        assert!(ctx.filter_logs(log_filter).unwrap().is_empty());
    }
}
