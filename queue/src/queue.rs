//! The queue manager: ordered lists, monotonic ids, timed removal.
//!
//! [`TxQueue`] is a cloneable handle over shared state. Both lists are kept as
//! `Arc<Vec<_>>` snapshots; a mutation builds a new list and installs it
//! wholesale, so observers holding an earlier snapshot never see a partial
//! update. Every installed snapshot is also published through a
//! `tokio::sync::watch` channel for observers that want change notification
//! rather than polling.
//!
//! Completed entries and notifications are removed by fire-and-forget timers:
//! scheduled once, never cancelled, and resolved by id against the state at
//! fire time, so a timer outliving its entry is a harmless no-op.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep_until, Instant};

use crate::classify::{ErrorResolver, EventClassifier, NoopResolver};
use crate::model::{
    ActionStatus, QueueStatus, QueueTx, RpcCall, Submission, TxResult, TxStatus,
};

/// Delay before a completed entry or notification is removed from its list.
pub const REMOVE_TIMEOUT: Duration = Duration::from_millis(7500);

/// Immutable snapshot of the status-notification list.
pub type StatusSnapshot = Arc<Vec<QueueStatus>>;

/// Immutable snapshot of the transaction list.
pub type TxSnapshot = Arc<Vec<QueueTx>>;

/// Tuning for a [`TxQueue`].
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// How long completed entries and notifications linger before removal.
    pub remove_delay: Duration,
    /// Statuses after which an entry's `status` field is frozen and its
    /// removal is scheduled. Supplied by the embedding application; the queue
    /// itself has no opinion on which statuses are final.
    pub terminal: HashSet<TxStatus>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            remove_delay: REMOVE_TIMEOUT,
            terminal: [
                TxStatus::Cancelled,
                TxStatus::Completed,
                TxStatus::Dropped,
                TxStatus::Error,
                TxStatus::Finalized,
                TxStatus::FinalityTimeout,
                TxStatus::Invalid,
                TxStatus::Usurped,
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// State shared by every clone of a [`TxQueue`] handle.
struct Inner {
    /// Monotonic id counter shared by both lists.
    next_id: u64,
    /// Current status-notification snapshot.
    status_list: StatusSnapshot,
    /// Current transaction snapshot.
    tx_list: TxSnapshot,
    /// Publishes each installed status snapshot.
    status_watch: watch::Sender<StatusSnapshot>,
    /// Publishes each installed transaction snapshot.
    tx_watch: watch::Sender<TxSnapshot>,
}

impl Inner {
    /// Hands out the next id in the shared sequence.
    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Installs and publishes a new status-list snapshot.
    fn install_status(&mut self, list: Vec<QueueStatus>) {
        let snapshot = Arc::new(list);
        self.status_list = Arc::clone(&snapshot);
        self.status_watch.send_replace(snapshot);
    }

    /// Installs and publishes a new transaction-list snapshot.
    fn install_txs(&mut self, list: Vec<QueueTx>) {
        let snapshot = Arc::new(list);
        self.tx_list = Arc::clone(&snapshot);
        self.tx_watch.send_replace(snapshot);
    }
}

/// The queue manager.
///
/// Holds two ordered lists: transient status notifications and transaction
/// entries tracked through their lifecycle. All state, including the id
/// counter, is owned by this one handle; clones share it. Mutations are
/// serialized through a single async mutex, matching the cooperative
/// single-writer model of the dapp this backs.
#[derive(Clone)]
pub struct TxQueue {
    /// Shared mutable state.
    inner: Arc<Mutex<Inner>>,
    /// Removal delay and terminal-status set.
    config: Arc<QueueConfig>,
    /// Turns execution results into notifications.
    classifier: Arc<EventClassifier>,
    /// Resolves module dispatch errors to symbolic names.
    resolver: Arc<dyn ErrorResolver>,
}

impl TxQueue {
    /// Queue with the stock classifier and no metadata resolver attached.
    pub fn new(config: QueueConfig) -> Self {
        let status_list: StatusSnapshot = Arc::new(Vec::new());
        let tx_list: TxSnapshot = Arc::new(Vec::new());
        let (status_watch, _) = watch::channel(Arc::clone(&status_list));
        let (tx_watch, _) = watch::channel(Arc::clone(&tx_list));

        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                status_list,
                tx_list,
                status_watch,
                tx_watch,
            })),
            config: Arc::new(config),
            classifier: Arc::new(EventClassifier::new()),
            resolver: Arc::new(NoopResolver),
        }
    }

    /// Replaces the event classifier. Call before sharing the handle.
    pub fn with_classifier(mut self, classifier: EventClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replaces the module-error resolver. Call before sharing the handle.
    pub fn with_resolver(mut self, resolver: Arc<dyn ErrorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Appends a transaction entry with status `queued` and returns its id.
    ///
    /// The RPC descriptor defaults to submit-and-watch when the caller
    /// supplies none. The caller is expected to hand the id to whatever
    /// drives the actual submission.
    pub async fn enqueue_transaction(&self, submission: Submission, rpc: Option<RpcCall>) -> u64 {
        let mut inner = self.inner.lock().await;
        let id = inner.fresh_id();

        let mut list = inner.tx_list.as_ref().clone();
        list.push(QueueTx {
            id,
            submission,
            rpc: rpc.unwrap_or_default(),
            status: TxStatus::Queued,
            result: None,
            error: None,
        });
        inner.install_txs(list);

        debug!("queued transaction #{id}");
        id
    }

    /// Appends an extrinsic-like submission; see [`Self::enqueue_transaction`].
    pub async fn enqueue_extrinsic(
        &self,
        account: Option<String>,
        call_data: Option<Vec<u8>>,
    ) -> u64 {
        self.enqueue_transaction(Submission::Extrinsic { account, call_data }, None)
            .await
    }

    /// Appends a raw RPC call; see [`Self::enqueue_transaction`].
    pub async fn enqueue_rpc(&self, rpc: RpcCall, params: Vec<serde_json::Value>) -> u64 {
        self.enqueue_transaction(Submission::Rpc { params }, Some(rpc))
            .await
    }

    /// Appends one or many status notifications.
    ///
    /// An empty input is a complete no-op: the current snapshot is not even
    /// replaced. Each appended notification gets a fresh id and a removal
    /// timer scheduled immediately, firing after the configured delay.
    pub async fn enqueue_status(&self, statuses: impl IntoIterator<Item = ActionStatus>) {
        let statuses: Vec<ActionStatus> = statuses.into_iter().collect();
        if statuses.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().await;
        let mut list = inner.status_list.as_ref().clone();
        for status in statuses {
            let id = inner.fresh_id();
            list.push(QueueStatus {
                id,
                action: status.action,
                status: status.status,
                message: status.message,
                is_completed: false,
            });
            self.schedule_status_removal(id);
        }
        inner.install_status(list);
    }

    /// Applies a status transition reported by the submission pipeline.
    ///
    /// Unknown ids are silently ignored apart from the derived notifications:
    /// a missing entry usually means it was already removed. `result` and
    /// `error` are merged only when provided and keep merging even after the
    /// entry's status froze on a terminal value. When `status` itself is
    /// terminal, removal of the entry is scheduled after the configured
    /// delay.
    pub async fn update_tx_status(
        &self,
        id: u64,
        status: TxStatus,
        result: Option<TxResult>,
        error: Option<String>,
    ) {
        let derived = result
            .as_ref()
            .map(|result| self.classifier.extract(result, self.resolver.as_ref()))
            .unwrap_or_default();

        {
            let mut inner = self.inner.lock().await;
            if !inner.tx_list.iter().any(|item| item.id == id) {
                debug!("status update for unknown transaction #{id}, ignoring");
            } else {
                let list = inner
                    .tx_list
                    .iter()
                    .map(|item| {
                        if item.id != id {
                            return item.clone();
                        }
                        let mut updated = item.clone();
                        if let Some(result) = &result {
                            updated.result = Some(result.clone());
                        }
                        if let Some(error) = &error {
                            updated.error = Some(error.clone());
                        }
                        if !self.config.terminal.contains(&item.status) {
                            updated.status = status;
                        }
                        updated
                    })
                    .collect();
                inner.install_txs(list);
                debug!("transaction #{id} reported as {status:?}");
            }
        }

        self.enqueue_status(derived).await;

        if self.config.terminal.contains(&status) {
            self.schedule_tx_removal(id);
        }
    }

    /// Current status-notification snapshot.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        Arc::clone(&self.inner.lock().await.status_list)
    }

    /// Current transaction snapshot.
    pub async fn tx_snapshot(&self) -> TxSnapshot {
        Arc::clone(&self.inner.lock().await.tx_list)
    }

    /// Watch channel yielding every installed status-notification snapshot.
    pub async fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.lock().await.status_watch.subscribe()
    }

    /// Watch channel yielding every installed transaction snapshot.
    pub async fn subscribe_txs(&self) -> watch::Receiver<TxSnapshot> {
        self.inner.lock().await.tx_watch.subscribe()
    }

    /// Schedules removal of notification `id` after the configured delay.
    ///
    /// The deadline is captured now; the lookup happens when the timer fires,
    /// against whatever the list holds at that point.
    fn schedule_status_removal(&self, id: u64) {
        let queue = self.clone();
        let deadline = Instant::now() + self.config.remove_delay;
        tokio::spawn(async move {
            sleep_until(deadline).await;
            let mut inner = queue.inner.lock().await;
            if inner.status_list.iter().any(|item| item.id == id) {
                let list = inner
                    .status_list
                    .iter()
                    .filter(|item| item.id != id)
                    .cloned()
                    .collect();
                inner.install_status(list);
            }
        });
    }

    /// Schedules removal of transaction entry `id` after the configured
    /// delay. Same contract as [`Self::schedule_status_removal`].
    fn schedule_tx_removal(&self, id: u64) {
        let queue = self.clone();
        let deadline = Instant::now() + self.config.remove_delay;
        tokio::spawn(async move {
            sleep_until(deadline).await;
            let mut inner = queue.inner.lock().await;
            if inner.tx_list.iter().any(|item| item.id == id) {
                let list = inner
                    .tx_list
                    .iter()
                    .filter(|item| item.id != id)
                    .cloned()
                    .collect();
                inner.install_txs(list);
                debug!("removed completed transaction #{id}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::task::yield_now;
    use tokio::time::advance;

    use super::*;
    use crate::model::{DispatchError, EventRecord, ModuleError, StatusKind};

    fn event_status(action: &str) -> ActionStatus {
        ActionStatus::new(action, StatusKind::Event, "extrinsic event")
    }

    /// Lets spawned timer tasks run after the clock moved.
    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ids_increase_across_flattened_enqueues() {
        let queue = TxQueue::new(QueueConfig::default());

        queue
            .enqueue_status([event_status("a.A"), event_status("b.B")])
            .await;
        queue.enqueue_status([event_status("c.C")]).await;
        let tx_id = queue.enqueue_extrinsic(None, None).await;

        let snapshot = queue.status_snapshot().await;
        assert_eq!(snapshot.len(), 3);
        let ids: Vec<u64> = snapshot.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(snapshot.iter().all(|item| !item.is_completed));
        assert_eq!(tx_id, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_status_enqueue_is_a_no_op() {
        let queue = TxQueue::new(QueueConfig::default());
        queue.enqueue_status([event_status("a.A")]).await;

        let before = queue.status_snapshot().await;
        queue.enqueue_status(Vec::new()).await;
        let after = queue.status_snapshot().await;

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_notifications_expire_after_the_delay() {
        let queue = TxQueue::new(QueueConfig::default());
        queue.enqueue_status([event_status("a.A")]).await;

        advance(Duration::from_millis(7400)).await;
        settle().await;
        assert_eq!(queue.status_snapshot().await.len(), 1);

        advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(queue.status_snapshot().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_is_frozen_but_payloads_still_merge() {
        let queue = TxQueue::new(QueueConfig::default());
        let id = queue.enqueue_extrinsic(None, None).await;

        queue
            .update_tx_status(id, TxStatus::Finalized, None, None)
            .await;
        queue
            .update_tx_status(id, TxStatus::Sending, None, Some("late failure".into()))
            .await;

        let snapshot = queue.tx_snapshot().await;
        assert_eq!(snapshot[0].status, TxStatus::Finalized);
        assert_eq!(snapshot[0].error.as_deref(), Some("late failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_entries_are_removed_after_the_delay() {
        let queue = TxQueue::new(QueueConfig::default());
        let id = queue.enqueue_extrinsic(None, None).await;
        queue
            .update_tx_status(id, TxStatus::Finalized, None, None)
            .await;

        advance(Duration::from_millis(7400)).await;
        settle().await;
        assert_eq!(queue.tx_snapshot().await.len(), 1);

        advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(queue.tx_snapshot().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn updates_for_unknown_ids_are_ignored() {
        let queue = TxQueue::new(QueueConfig::default());

        queue
            .update_tx_status(42, TxStatus::Finalized, None, None)
            .await;

        assert!(queue.tx_snapshot().await.is_empty());
        assert!(queue.status_snapshot().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_events_collapse_into_one_notification() {
        let queue = TxQueue::new(QueueConfig::default());
        let id = queue.enqueue_extrinsic(None, None).await;

        let result = TxResult {
            block_hash: None,
            events: vec![EventRecord::new("balances", "Transfer"); 3],
        };
        queue
            .update_tx_status(id, TxStatus::InBlock, Some(result), None)
            .await;

        let snapshot = queue.status_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].action, "balances.Transfer (x3)");
        assert_eq!(snapshot[0].status, StatusKind::Event);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_module_errors_surface_the_raw_type_name() {
        let queue = TxQueue::new(QueueConfig::default());
        let id = queue.enqueue_extrinsic(None, None).await;

        let result = TxResult {
            block_hash: None,
            events: vec![EventRecord::new("system", "ExtrinsicFailed")
                .with_dispatch_error(DispatchError::Module(ModuleError { index: 5, error: 2 }))],
        };
        queue
            .update_tx_status(id, TxStatus::Error, Some(result), None)
            .await;

        let snapshot = queue.status_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, StatusKind::Error);
        assert_eq!(snapshot[0].message, "Module");
    }

    #[tokio::test(start_paused = true)]
    async fn finalized_entries_carry_their_result_until_removal() {
        let queue = TxQueue::new(QueueConfig::default());
        let id = queue
            .enqueue_extrinsic(Some("alice".into()), None)
            .await;

        let result = TxResult {
            block_hash: Some("0xabc".into()),
            events: Vec::new(),
        };
        queue
            .update_tx_status(id, TxStatus::Finalized, Some(result.clone()), None)
            .await;

        let snapshot = queue.tx_snapshot().await;
        assert_eq!(snapshot[0].status, TxStatus::Finalized);
        assert_eq!(snapshot[0].result.as_ref(), Some(&result));
        assert_eq!(snapshot[0].rpc, RpcCall::default());

        advance(Duration::from_millis(7600)).await;
        settle().await;
        assert!(queue.tx_snapshot().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watchers_observe_each_installed_snapshot() {
        let queue = TxQueue::new(QueueConfig::default());
        let mut txs = queue.subscribe_txs().await;

        let id = queue.enqueue_extrinsic(None, None).await;
        txs.changed().await.unwrap();
        assert_eq!(txs.borrow_and_update().len(), 1);

        queue
            .update_tx_status(id, TxStatus::Sending, None, None)
            .await;
        txs.changed().await.unwrap();
        assert_eq!(txs.borrow_and_update()[0].status, TxStatus::Sending);
    }
}
