use bloodcore_core::AggregateId;

/// A command targets a specific aggregate.
///
/// Commands represent **intent** - a request to perform an action on an
/// aggregate. They are transient (not persisted) and are transformed into
/// events (which are persisted). Commands are rejected if invalid; events
/// represent accepted changes.
///
/// Each command operates on exactly one aggregate stream, which is the
/// transaction boundary for single-aggregate operations. Hospital scoping is
/// enforced at the event level (envelopes), keeping commands domain-focused.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
