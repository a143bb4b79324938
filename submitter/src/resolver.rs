//! Metadata-backed module-error resolution.

use subxt::Metadata;
use tx_queue::classify::{ErrorResolver, ResolvedError};
use tx_queue::model::ModuleError;

use crate::client::Api;
use crate::events::section_name;

/// Resolves module dispatch errors through chain metadata.
///
/// Plugged into the queue's classifier so that a failed extrinsic surfaces as
/// `section.ErrorName` instead of a bare `Module`. Lookups that miss resolve
/// to `None`; the classifier handles the fallback.
pub struct MetadataResolver {
    /// The metadata blob lookups run against.
    metadata: Metadata,
}

impl MetadataResolver {
    /// Wraps an already fetched metadata blob.
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    /// Snapshot of the metadata the connected client was built with.
    pub fn from_client(api: &Api) -> Self {
        Self::new(api.metadata())
    }
}

impl ErrorResolver for MetadataResolver {
    fn resolve(&self, module: &ModuleError) -> Option<ResolvedError> {
        let pallet = self.metadata.pallet_by_index(module.index)?;
        let variant = pallet.error_variant_by_index(module.error)?;

        Some(ResolvedError {
            section: section_name(pallet.name()),
            name: variant.name.clone(),
        })
    }
}
