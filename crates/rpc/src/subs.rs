//! Push subscriptions over the node's notification channels.
//!
//! Each `eth_subscribe` spawns a task that consumes either the mined-block
//! broadcast or the pending-transaction broadcast, filters events through the
//! subscription's [`InterestKind`], and pushes `eth_subscription` messages to
//! the client as channel capacity allows.

use ajj::{serde_json, HandlerCtx};
use alloy::{
    primitives::{B256, U64},
    rpc::types::{Header, Log},
};
use dashmap::DashMap;
use simnode_ledger::MinedBlock;
use simnode_node::{ChainNotification, InterestKind, SimNode};
use std::{
    cmp::min,
    collections::VecDeque,
    future::pending,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, debug_span, enabled, trace, Instrument};

/// Either type for subscription outputs.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub(crate) enum Either {
    Log(Box<Log>),
    Block(Box<Header>),
    Hash(B256),
}

/// The broadcast stream a subscription consumes.
enum SubSource {
    Chain(broadcast::Receiver<ChainNotification>),
    Pending(broadcast::Receiver<B256>),
}

enum SubEvent {
    Chain(ChainNotification),
    Pending(B256),
}

impl SubSource {
    async fn recv(&mut self) -> Result<SubEvent, RecvError> {
        match self {
            Self::Chain(rx) => rx.recv().await.map(SubEvent::Chain),
            Self::Pending(rx) => rx.recv().await.map(SubEvent::Pending),
        }
    }
}

fn rpc_header(block: &MinedBlock) -> Header {
    Header {
        hash: block.hash,
        inner: block.header.clone(),
        total_difficulty: None,
        size: None,
    }
}

/// Filter one inbound event into zero or more outbound items.
fn filter_event(kind: &InterestKind, event: &SubEvent) -> Vec<Either> {
    match (kind, event) {
        (InterestKind::Block, SubEvent::Chain(notif)) => {
            vec![Either::Block(Box::new(rpc_header(&notif.block)))]
        }
        (InterestKind::Log(criteria), SubEvent::Chain(notif)) => {
            if !criteria.bloom_candidate(notif.block.header.logs_bloom) {
                return vec![];
            }
            notif
                .receipts
                .iter()
                .flat_map(|receipt| receipt.logs.iter())
                .filter(|log| criteria.matches_log(&log.inner))
                .map(|log| Either::Log(Box::new(log.clone())))
                .collect()
        }
        (InterestKind::PendingTransaction, SubEvent::Pending(hash)) => {
            vec![Either::Hash(*hash)]
        }
        _ => vec![],
    }
}

/// Tracks ongoing subscription tasks.
///
/// Performs the following functions:
/// - assigns unique subscription IDs
/// - spawns tasks to manage each subscription
/// - allows cancelling subscriptions by ID
///
/// Calling [`Self::new`] spawns a task that periodically reaps entries whose
/// client disconnected. That task runs on a separate thread to stay out of
/// [`DashMap::retain`]'s deadlock conditions.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<SubscriptionManagerInner>,
}

impl SubscriptionManager {
    /// Instantiate a manager and start its cleaner.
    pub fn new(node: SimNode, clean_interval: Duration) -> Self {
        let inner = Arc::new(SubscriptionManagerInner::new(node));
        SubCleanerTask::new(Arc::downgrade(&inner), clean_interval).spawn();
        Self { inner }
    }
}

impl core::ops::Deref for SubscriptionManager {
    type Target = SubscriptionManagerInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl core::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionManager").finish_non_exhaustive()
    }
}

/// Inner logic for [`SubscriptionManager`].
pub struct SubscriptionManagerInner {
    next_id: AtomicU64,
    tasks: DashMap<U64, CancellationToken>,
    node: SimNode,
}

impl SubscriptionManagerInner {
    fn new(node: SimNode) -> Self {
        Self { next_id: AtomicU64::new(1), tasks: DashMap::new(), node }
    }

    fn next_id(&self) -> U64 {
        U64::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Cancel a subscription task. Returns false for unknown ids.
    pub fn unsubscribe(&self, id: U64) -> bool {
        if let Some(task) = self.tasks.remove(&id) {
            task.1.cancel();
            true
        } else {
            false
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no subscription is live.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start a subscription. Returns `None` when the connection cannot carry
    /// notifications (e.g. plain HTTP).
    pub fn subscribe(&self, ajj_ctx: &HandlerCtx, kind: InterestKind) -> Option<U64> {
        if !ajj_ctx.notifications_enabled() {
            return None;
        }

        let id = self.next_id();
        let token = CancellationToken::new();
        let source = match kind {
            InterestKind::PendingTransaction => {
                SubSource::Pending(self.node.subscribe_pending_transactions())
            }
            _ => SubSource::Chain(self.node.subscribe()),
        };
        let task = SubscriptionTask { id, kind, token: token.clone(), source };
        task.spawn(ajj_ctx);
        self.tasks.insert(id, token);

        debug!(%id, "registered new subscription");

        Some(id)
    }
}

impl core::fmt::Debug for SubscriptionManagerInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionManagerInner")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Task to manage a single subscription.
struct SubscriptionTask {
    id: U64,
    kind: InterestKind,
    token: CancellationToken,
    source: SubSource,
}

impl SubscriptionTask {
    async fn task_future(self, ajj_ctx: HandlerCtx, ajj_cancel: WaitForCancellationFutureOwned) {
        let SubscriptionTask { id, kind, token, mut source } = self;

        let Some(sender) = ajj_ctx.notifications() else { return };

        let mut buffer: VecDeque<Either> = VecDeque::new();
        tokio::pin!(ajj_cancel);

        loop {
            let span =
                debug_span!(parent: None, "SubscriptionTask::task_future", %id, kind = tracing::field::Empty);
            if enabled!(tracing::Level::TRACE) {
                span.record("kind", format!("{kind:?}"));
            }

            let guard = span.enter();
            // Waits for send capacity only while something is buffered;
            // otherwise parks forever so the select below ignores this arm.
            let permit_fut = async {
                if !buffer.is_empty() {
                    // Reserve at most half the capacity to avoid starving
                    // other users of the channel.
                    sender.reserve_many(min(sender.max_capacity() / 2, buffer.len())).await
                } else {
                    pending().await
                }
            }
            .in_current_span();
            drop(guard);

            // Biased: drain (or block on) the outbound buffer before pulling
            // more events in.
            tokio::select! {
                biased;
                _ = &mut ajj_cancel => {
                    let _guard = span.enter();
                    // Client disconnect. Cancel the token so the cleaner
                    // reaps our registry entry.
                    trace!("subscription cancelled by client disconnect");
                    token.cancel();
                    break;
                }
                _ = token.cancelled() => {
                    let _guard = span.enter();
                    trace!("subscription cancelled by eth_unsubscribe");
                    break;
                }
                permits = permit_fut => {
                    let _guard = span.enter();
                    let Ok(permits) = permits else {
                        trace!("channel to client closed");
                        break
                    };

                    for permit in permits {
                        let Some(item) = buffer.pop_front() else { break };
                        let notification = serde_json::json! {
                            {
                                "jsonrpc": "2.0",
                                "method": "eth_subscription",
                                "params": {
                                    "result": &item,
                                    "subscription": id
                                },
                            }
                        };
                        let Ok(raw) = serde_json::value::to_raw_value(&notification) else {
                            trace!(?item, "failed to serialize notification");
                            continue
                        };
                        permit.send(raw);
                    }
                }
                event = source.recv() => {
                    let _guard = span.enter();

                    let event = match event {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            trace!(skipped, "missed notifications");
                            continue;
                        }
                        Err(RecvError::Closed) => {
                            trace!("notification stream closed");
                            break;
                        }
                    };

                    let output = filter_event(&kind, &event);
                    trace!(count = output.len(), "filter applied to notification");
                    buffer.extend(output);
                }
            }
        }
    }

    fn spawn(self, ctx: &HandlerCtx) {
        ctx.spawn_graceful_with_ctx(|ctx, ajj_cancel| self.task_future(ctx, ajj_cancel));
    }
}

/// Reaps registry entries for subscriptions whose task has ended.
///
/// Runs on a separate thread, which keeps [`DashMap::retain`] away from its
/// deadlock conditions.
struct SubCleanerTask {
    inner: Weak<SubscriptionManagerInner>,
    interval: Duration,
}

impl SubCleanerTask {
    const fn new(inner: Weak<SubscriptionManagerInner>, interval: Duration) -> Self {
        Self { inner, interval }
    }

    fn spawn(self) {
        std::thread::spawn(move || loop {
            std::thread::sleep(self.interval);
            match self.inner.upgrade() {
                Some(inner) => inner.tasks.retain(|_, task| !task.is_cancelled()),
                None => break,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        consensus::Header as ConsensusHeader,
        primitives::{Address, Bloom},
        rpc::types::Filter,
    };
    use simnode_ledger::LogCriteria;

    #[test]
    fn block_interest_yields_headers() {
        let block = Arc::new(MinedBlock::seal(
            ConsensusHeader { number: 3, ..Default::default() },
            vec![],
        ));
        let event =
            SubEvent::Chain(ChainNotification { block: block.clone(), receipts: vec![] });

        let out = filter_event(&InterestKind::Block, &event);
        assert_eq!(out.len(), 1);
        match &out[0] {
            Either::Block(header) => assert_eq!(header.hash, block.hash),
            other => panic!("expected a header, got {other:?}"),
        }
    }

    #[test]
    fn log_interest_skips_bloom_misses() {
        let criteria = InterestKind::Log(Box::new(LogCriteria::new(
            Filter::new().address(Address::repeat_byte(0xaa)),
        )));
        // Empty bloom cannot contain the address.
        let block = Arc::new(MinedBlock::seal(
            ConsensusHeader { number: 1, logs_bloom: Bloom::default(), ..Default::default() },
            vec![],
        ));
        let event = SubEvent::Chain(ChainNotification { block, receipts: vec![] });

        assert!(filter_event(&criteria, &event).is_empty());
    }

    #[test]
    fn pending_interest_ignores_chain_events() {
        let block = Arc::new(MinedBlock::seal(ConsensusHeader::default(), vec![]));
        let chain = SubEvent::Chain(ChainNotification { block, receipts: vec![] });
        assert!(filter_event(&InterestKind::PendingTransaction, &chain).is_empty());

        let hash = B256::repeat_byte(0x42);
        let pending = SubEvent::Pending(hash);
        let out = filter_event(&InterestKind::PendingTransaction, &pending);
        assert!(matches!(out[0], Either::Hash(h) if h == hash));
    }
}
