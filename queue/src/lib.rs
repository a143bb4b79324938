//! # Transaction/status queue
//!
//! In-memory queue manager for a dapp backend tracking in-flight Substrate
//! extrinsic submissions and the transient notifications derived from them.
//!
//! ## Overview
//! The crate is built around three pieces:
//!
//! - [`queue::TxQueue`]: two ordered lists (status notifications, transaction
//!   entries) behind one cloneable handle, with a shared monotonic id counter
//!   and timed auto-removal of completed entries.
//! - [`classify::EventClassifier`]: turns the event log of an execution result
//!   into human-readable notifications, collapsing duplicates.
//! - [`classify::ErrorResolver`]: the seam through which module dispatch
//!   errors are resolved to symbolic names via chain metadata.
//!
//! Observers read both lists as immutable snapshots; every mutation installs a
//! whole new list value, so a previously taken snapshot never shows a partial
//! update. The submission pipeline driving the chain side lives in the
//! companion `tx-submitter` crate.

/// Event classification and module-error resolution.
pub mod classify;

/// Queue data model.
pub mod model;

/// The queue manager itself.
pub mod queue;
