//! Classification of extrinsic events into queue notifications.
//!
//! The classifier turns the event log of an execution result into
//! [`ActionStatus`] notifications: a section-exclusion filter in front of an
//! ordered list of registered handlers, with a generic `extrinsic event`
//! fallback behind them. Notifications sharing an action and outcome kind are
//! merged into one entry with a multiplicity suffix.

use log::debug;

use crate::model::{ActionStatus, DispatchError, EventRecord, ModuleError, StatusKind, TxResult};

/// Symbolic `section`/`name` pair resolved from chain metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedError {
    /// Pallet the error belongs to, in dapp spelling.
    pub section: String,
    /// Name of the error variant.
    pub name: String,
}

/// Resolves a module error index pair to a symbolic name.
///
/// Implementations signal failure by returning `None`; the classifier then
/// falls back to the raw dispatch error type name. Resolution failure is never
/// surfaced to callers.
pub trait ErrorResolver: Send + Sync {
    /// Looks up `module` in chain metadata.
    fn resolve(&self, module: &ModuleError) -> Option<ResolvedError>;
}

/// Resolver that never resolves anything.
///
/// The default for queues that have no metadata source attached.
pub struct NoopResolver;

impl ErrorResolver for NoopResolver {
    fn resolve(&self, _module: &ModuleError) -> Option<ResolvedError> {
        None
    }
}

/// A registered classification handler. Returning `None` passes the event on
/// to the next handler.
pub type EventHandler =
    Box<dyn Fn(&EventRecord, &dyn ErrorResolver) -> Option<ActionStatus> + Send + Sync>;

/// Classifies extrinsic events into [`ActionStatus`] notifications.
pub struct EventClassifier {
    /// Sections whose events are handled elsewhere and never classified here.
    excluded_sections: Vec<String>,
    /// Handlers consulted in registration order; the first `Some` wins.
    handlers: Vec<EventHandler>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventClassifier {
    /// Classifier with the stock handlers (dispatch failures, contract
    /// execution topics) and the `democracy` section excluded.
    pub fn new() -> Self {
        let mut classifier = Self::empty();
        classifier.exclude_section("democracy");
        classifier.register(extrinsic_failed);
        classifier.register(contract_execution);
        classifier
    }

    /// Classifier with no handlers and no exclusions.
    pub fn empty() -> Self {
        Self {
            excluded_sections: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Drops every event of `section` from classification.
    pub fn exclude_section(&mut self, section: impl Into<String>) {
        self.excluded_sections.push(section.into());
    }

    /// Registers a handler consulted before the generic fallback.
    pub fn register<F>(&mut self, handler: F)
    where
        F: Fn(&EventRecord, &dyn ErrorResolver) -> Option<ActionStatus> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Classifies one event; `None` when its section is excluded.
    pub fn classify(
        &self,
        record: &EventRecord,
        resolver: &dyn ErrorResolver,
    ) -> Option<ActionStatus> {
        if self.excluded_sections.iter().any(|s| s == &record.section) {
            return None;
        }

        for handler in &self.handlers {
            if let Some(status) = handler(record, resolver) {
                return Some(status);
            }
        }

        Some(ActionStatus::new(
            format!("{}.{}", record.section, record.method),
            StatusKind::Event,
            "extrinsic event",
        ))
    }

    /// Derives the merged notification list for a result's event log.
    pub fn extract(&self, result: &TxResult, resolver: &dyn ErrorResolver) -> Vec<ActionStatus> {
        merge_status(
            result
                .events
                .iter()
                .filter_map(|record| self.classify(record, resolver))
                .collect(),
        )
    }
}

/// Stock handler for `system.ExtrinsicFailed`.
///
/// Module errors are resolved to `section.name` through the resolver; a failed
/// lookup is swallowed and replaced with the raw dispatch error type name.
fn extrinsic_failed(record: &EventRecord, resolver: &dyn ErrorResolver) -> Option<ActionStatus> {
    if record.section != "system" || record.method != "ExtrinsicFailed" {
        return None;
    }

    let message = match &record.dispatch_error {
        Some(error) => match error {
            DispatchError::Module(module) => match resolver.resolve(module) {
                Some(resolved) => format!("{}.{}", resolved.section, resolved.name),
                None => {
                    debug!(
                        "no metadata entry for module error {}/{}",
                        module.index, module.error
                    );
                    error.type_name().to_owned()
                }
            },
            other => other.type_name().to_owned(),
        },
        None => String::new(),
    };

    Some(ActionStatus::new(
        format!("{}.{}", record.section, record.method),
        StatusKind::Error,
        message,
    ))
}

/// Stock handler for contract-execution events carrying topics.
///
/// The message is the last UTF-8 topic containing a `::` namespace separator,
/// or empty when none matches.
fn contract_execution(record: &EventRecord, _resolver: &dyn ErrorResolver) -> Option<ActionStatus> {
    if record.section != "contracts"
        || record.method != "ContractExecution"
        || record.topics.is_empty()
    {
        return None;
    }

    let message = record
        .topics
        .iter()
        .map(|topic| String::from_utf8_lossy(topic).into_owned())
        .filter(|topic| topic.contains("::"))
        .last()
        .unwrap_or_default();

    Some(ActionStatus::new(
        format!("{}.{}", record.section, record.method),
        StatusKind::Event,
        message,
    ))
}

/// Collapses notifications sharing an action and outcome kind into one entry,
/// annotating the action with an ` (xN)` multiplicity suffix when N > 1.
pub fn merge_status(statuses: Vec<ActionStatus>) -> Vec<ActionStatus> {
    let mut counted: Vec<(usize, ActionStatus)> = Vec::new();

    for status in statuses {
        match counted
            .iter_mut()
            .find(|(_, prev)| prev.action == status.action && prev.status == status.status)
        {
            Some((count, _)) => *count += 1,
            None => counted.push((1, status)),
        }
    }

    counted
        .into_iter()
        .map(|(count, status)| {
            if count == 1 {
                status
            } else {
                ActionStatus {
                    action: format!("{} (x{})", status.action, count),
                    ..status
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolver that knows exactly one module error.
    struct FixedResolver;

    impl ErrorResolver for FixedResolver {
        fn resolve(&self, module: &ModuleError) -> Option<ResolvedError> {
            (module.index == 7 && module.error == 2).then(|| ResolvedError {
                section: "contracts".into(),
                name: "OutOfGas".into(),
            })
        }
    }

    fn failed(index: u8, error: u8) -> EventRecord {
        EventRecord::new("system", "ExtrinsicFailed")
            .with_dispatch_error(DispatchError::Module(ModuleError { index, error }))
    }

    #[test]
    fn resolved_module_errors_use_the_symbolic_name() {
        let classifier = EventClassifier::new();

        let status = classifier.classify(&failed(7, 2), &FixedResolver).unwrap();

        assert_eq!(status.action, "system.ExtrinsicFailed");
        assert_eq!(status.status, StatusKind::Error);
        assert_eq!(status.message, "contracts.OutOfGas");
    }

    #[test]
    fn unresolved_module_errors_fall_back_to_the_type_name() {
        let classifier = EventClassifier::new();

        let status = classifier.classify(&failed(9, 0), &FixedResolver).unwrap();

        assert_eq!(status.message, "Module");
        assert_eq!(status.status, StatusKind::Error);
    }

    #[test]
    fn non_module_failures_keep_their_type_name() {
        let classifier = EventClassifier::new();
        let record = EventRecord::new("system", "ExtrinsicFailed")
            .with_dispatch_error(DispatchError::Other("BadOrigin".into()));

        let status = classifier.classify(&record, &NoopResolver).unwrap();

        assert_eq!(status.message, "BadOrigin");
    }

    #[test]
    fn excluded_sections_produce_nothing() {
        let classifier = EventClassifier::new();
        let record = EventRecord::new("democracy", "Proposed");

        assert!(classifier.classify(&record, &NoopResolver).is_none());
    }

    #[test]
    fn contract_execution_extracts_the_last_namespaced_topic() {
        let classifier = EventClassifier::new();
        let record = EventRecord::new("contracts", "ContractExecution").with_topics(vec![
            b"junk".to_vec(),
            b"erc20::Transfer".to_vec(),
            b"flip::Flipped".to_vec(),
        ]);

        let status = classifier.classify(&record, &NoopResolver).unwrap();

        assert_eq!(status.status, StatusKind::Event);
        assert_eq!(status.message, "flip::Flipped");
    }

    #[test]
    fn contract_execution_without_namespaced_topics_has_an_empty_message() {
        let classifier = EventClassifier::new();
        let record =
            EventRecord::new("contracts", "ContractExecution").with_topics(vec![b"junk".to_vec()]);

        let status = classifier.classify(&record, &NoopResolver).unwrap();

        assert_eq!(status.message, "");
    }

    #[test]
    fn unrecognized_events_map_to_the_generic_message() {
        let classifier = EventClassifier::new();
        let record = EventRecord::new("balances", "Transfer");

        let status = classifier.classify(&record, &NoopResolver).unwrap();

        assert_eq!(status.action, "balances.Transfer");
        assert_eq!(status.status, StatusKind::Event);
        assert_eq!(status.message, "extrinsic event");
    }

    #[test]
    fn registered_handlers_run_before_the_fallback() {
        let mut classifier = EventClassifier::new();
        classifier.register(|record, _| {
            (record.section == "balances")
                .then(|| ActionStatus::new("balances.custom", StatusKind::Success, "handled"))
        });

        let status = classifier
            .classify(&EventRecord::new("balances", "Transfer"), &NoopResolver)
            .unwrap();

        assert_eq!(status.action, "balances.custom");
        assert_eq!(status.message, "handled");
    }

    #[test]
    fn duplicates_merge_with_a_multiplicity_suffix() {
        let classifier = EventClassifier::new();
        let result = TxResult {
            block_hash: None,
            events: vec![
                EventRecord::new("balances", "Transfer"),
                EventRecord::new("balances", "Transfer"),
                EventRecord::new("balances", "Transfer"),
                EventRecord::new("system", "ExtrinsicSuccess"),
            ],
        };

        let merged = classifier.extract(&result, &NoopResolver);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].action, "balances.Transfer (x3)");
        assert_eq!(merged[1].action, "system.ExtrinsicSuccess");
    }
}
