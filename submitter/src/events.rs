//! Bridging of chain events into queue event records.
//!
//! The queue core is deliberately free of `subxt` types; this module converts
//! a block's events into the core [`EventRecord`] representation, decoding
//! just enough of a dispatch failure to let the classifier resolve it.

use subxt::events::EventDetails;
use subxt::PolkadotConfig;
use tx_queue::model::{DispatchError, EventRecord, ModuleError};

/// `sp_runtime::DispatchError` variant names, in SCALE tag order.
const DISPATCH_ERROR_VARIANTS: [&str; 14] = [
    "Other",
    "CannotLookup",
    "BadOrigin",
    "Module",
    "ConsumerRemaining",
    "NoProviders",
    "TooManyConsumers",
    "Token",
    "Arithmetic",
    "Transactional",
    "Exhausted",
    "Corruption",
    "Unavailable",
    "RootNotAllowed",
];

/// SCALE tag of the `Module` dispatch-error variant.
const MODULE_TAG: u8 = 3;

/// Decodes the leading `DispatchError` bytes of a `System.ExtrinsicFailed`
/// event field.
///
/// Only the variant tag and, for module errors, the pallet index and the
/// first error byte are needed downstream, so no full SCALE decoder is
/// involved. Unknown tags decode to `Other("Unknown")` rather than failing.
pub fn decode_dispatch_error(bytes: &[u8]) -> DispatchError {
    match bytes {
        [MODULE_TAG, index, error, ..] => DispatchError::Module(ModuleError {
            index: *index,
            error: *error,
        }),
        [tag, ..] if (*tag as usize) < DISPATCH_ERROR_VARIANTS.len() => {
            DispatchError::Other(DISPATCH_ERROR_VARIANTS[*tag as usize].to_owned())
        }
        _ => DispatchError::Other("Unknown".to_owned()),
    }
}

/// Maps a pallet name to the dapp spelling of its section
/// (`System` becomes `system`, `Contracts` becomes `contracts`).
pub fn section_name(pallet: &str) -> String {
    let mut chars = pallet.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Converts one chain event into the core record.
///
/// `System.ExtrinsicFailed` carries its decoded dispatch error; topics come
/// along as raw bytes for the classifier to interpret.
pub fn event_record(event: &EventDetails<PolkadotConfig>) -> EventRecord {
    let mut record = EventRecord::new(section_name(event.pallet_name()), event.variant_name());

    record.topics = event
        .topics()
        .iter()
        .map(|hash| hash.as_ref().to_vec())
        .collect();

    if event.pallet_name() == "System" && event.variant_name() == "ExtrinsicFailed" {
        record.dispatch_error = Some(decode_dispatch_error(event.field_bytes()));
    }

    record
}
