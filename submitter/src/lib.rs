//! # Submission pipeline
//!
//! Chain-facing counterpart of the `tx-queue` crate: signs and submits
//! extrinsics to a Substrate node over `subxt` and folds the resulting
//! transaction-progress stream into queue status updates, so observers of the
//! queue see the full lifecycle (`sending` through `finalized` or a failure
//! status) without touching the chain client themselves.

/// Chain client construction.
pub mod client;

/// Error types for the pipeline.
pub mod error;

/// Bridging of chain events into queue event records.
pub mod events;

/// Metadata-backed module-error resolution.
pub mod resolver;

/// Loading of signing keys.
pub mod signer;

/// The transaction submitter itself.
pub mod submitter;
