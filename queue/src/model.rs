//! Data model shared by the queue manager and its observers.
//!
//! All types here are plain data: cloneable, serializable, and never mutated
//! in place once they are part of a published snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome kind attached to a status notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    /// The originating action completed successfully.
    Success,
    /// The originating action failed.
    Error,
    /// A chain event emitted while executing the action.
    Event,
    /// A chain event that warrants attention.
    EventWarn,
    /// A payload was received from a counterparty.
    Received,
}

/// A classified, human-readable notification that has not been enqueued yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatus {
    /// Label of the originating action, usually `section.method`.
    pub action: String,
    /// Outcome kind.
    pub status: StatusKind,
    /// Free-text detail.
    pub message: String,
}

impl ActionStatus {
    /// Notification for `action` with the given kind and message.
    pub fn new(
        action: impl Into<String>,
        status: StatusKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            status,
            message: message.into(),
        }
    }
}

/// A transient notification tracked by the queue until its removal timer
/// fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Unique, monotonically increasing id assigned at enqueue time.
    pub id: u64,
    /// Action label; carries an ` (xN)` suffix when duplicates were merged.
    pub action: String,
    /// Outcome kind.
    pub status: StatusKind,
    /// Free-text detail.
    pub message: String,
    /// Always false at creation. Removal is time based, not flag based.
    pub is_completed: bool,
}

/// Lifecycle status of a tracked submission.
///
/// The vocabulary is open ended on purpose: which of these are terminal is
/// decided solely by the terminal set in
/// [`QueueConfig`](crate::queue::QueueConfig), never hardcoded here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Valid in a future block only (nonce gap).
    Future,
    /// Ready for inclusion.
    Ready,
    /// Accepted by the queue, nothing submitted yet.
    Queued,
    /// Waiting for a signature.
    Signing,
    /// Submission in flight.
    Sending,
    /// Accepted by the node.
    Sent,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a best-chain block.
    InBlock,
    /// No longer part of the best chain.
    Retracted,
    /// Finality was not reached in time.
    FinalityTimeout,
    /// Included in a finalized block.
    Finalized,
    /// Replaced by another transaction with the same nonce.
    Usurped,
    /// Dropped from the pool.
    Dropped,
    /// Rejected as invalid.
    Invalid,
    /// Cancelled before submission.
    Cancelled,
    /// Fully processed by the dapp.
    Completed,
    /// Failed outside on-chain execution.
    Error,
    /// The response arrived incomplete.
    Incomplete,
}

/// RPC method descriptor used to drive a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCall {
    /// RPC namespace, e.g. `author`.
    pub section: String,
    /// Method within the namespace.
    pub method: String,
}

impl RpcCall {
    /// Descriptor for `section.method`.
    pub fn new(section: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
        }
    }
}

impl Default for RpcCall {
    /// The submit-and-watch descriptor used when the caller supplies none.
    fn default() -> Self {
        Self::new("author", "submitAndWatchExtrinsic")
    }
}

/// What the caller wants driven through the submission pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Submission {
    /// An extrinsic-like payload signed on behalf of `account`.
    Extrinsic {
        /// Signing account, when known at enqueue time.
        account: Option<String>,
        /// Opaque encoded call data, when known at enqueue time.
        call_data: Option<Vec<u8>>,
    },
    /// A raw RPC call with JSON parameters.
    Rpc {
        /// Positional parameters for the call.
        params: Vec<Value>,
    },
}

/// One submission tracked through its lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueTx {
    /// Unique, monotonically increasing id; shares the sequence used for
    /// status notifications.
    pub id: u64,
    /// What is being submitted.
    pub submission: Submission,
    /// RPC descriptor driving the submission.
    pub rpc: RpcCall,
    /// Current lifecycle status.
    pub status: TxStatus,
    /// Latest outcome payload reported by the pipeline, if any.
    pub result: Option<TxResult>,
    /// Latest failure payload reported by the pipeline, if any.
    pub error: Option<String>,
}

/// Outcome payload reported by the submission pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Hash of the block the extrinsic landed in, if known.
    pub block_hash: Option<String>,
    /// Events emitted while executing the extrinsic.
    pub events: Vec<EventRecord>,
}

/// One event emitted during extrinsic execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emitting pallet, in dapp spelling (`system`, `contracts`, ...).
    pub section: String,
    /// Event name within the pallet.
    pub method: String,
    /// Raw event topics.
    pub topics: Vec<Vec<u8>>,
    /// Structured failure, present on dispatch-failure events.
    pub dispatch_error: Option<DispatchError>,
}

impl EventRecord {
    /// Record for `section.method` with no topics and no error payload.
    pub fn new(section: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
            topics: Vec::new(),
            dispatch_error: None,
        }
    }

    /// Attaches raw topics.
    pub fn with_topics(mut self, topics: Vec<Vec<u8>>) -> Self {
        self.topics = topics;
        self
    }

    /// Attaches a decoded dispatch error.
    pub fn with_dispatch_error(mut self, error: DispatchError) -> Self {
        self.dispatch_error = Some(error);
        self
    }
}

/// Structured failure code returned when an extrinsic's execution fails
/// on-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchError {
    /// An error raised by a specific runtime module.
    Module(ModuleError),
    /// Any other dispatch error, identified by its type name.
    Other(String),
}

impl DispatchError {
    /// The raw dispatch error type string, used as the notification message
    /// when no symbolic name can be resolved.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Module(_) => "Module",
            Self::Other(name) => name,
        }
    }
}

/// Module index / error index pair of a module dispatch error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleError {
    /// Index of the pallet within the runtime.
    pub index: u8,
    /// Index of the error within the pallet.
    pub error: u8,
}
