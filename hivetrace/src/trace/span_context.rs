use crate::trace::{SpanId, TraceFlags, TraceId};
use std::hash::{Hash, Hasher};

/// The propagable identity of a span.
///
/// A `SpanContext` is immutable and `Copy`; it is created once when a span
/// starts (or when a `traceparent` header is decoded) and passed around by
/// value from then on.
///
/// Equality covers what travels in a `traceparent` header: the two ids and
/// the trace flags. Whether the context was decoded from a carrier is not
/// part of its identity, so a context survives an inject/extract round trip
/// unchanged.
#[derive(Clone, Copy, Debug)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    trace_flags: TraceFlags,
    is_remote: bool,
}

impl SpanContext {
    /// An invalid span context.
    pub const NONE: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        trace_flags: TraceFlags::NOT_SAMPLED,
        is_remote: false,
    };

    /// Create an invalid empty span context
    pub fn empty_context() -> Self {
        SpanContext::NONE
    }

    /// Construct a new `SpanContext`
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        trace_flags: TraceFlags,
        is_remote: bool,
    ) -> Self {
        SpanContext {
            trace_id,
            span_id,
            trace_flags,
            is_remote,
        }
    }

    /// The trace this span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span's own id.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Flags sent along with the ids.
    pub fn trace_flags(&self) -> TraceFlags {
        self.trace_flags
    }

    /// Both ids are non-zero.
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }

    /// Returns `true` if the span context was decoded from a remote carrier.
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Returns `true` if the `sampled` trace flag is set.
    pub fn is_sampled(&self) -> bool {
        self.trace_flags.is_sampled()
    }
}

impl PartialEq for SpanContext {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id == other.trace_id
            && self.span_id == other.span_id
            && self.trace_flags == other.trace_flags
    }
}

impl Eq for SpanContext {}

impl Hash for SpanContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trace_id.hash(state);
        self.span_id.hash(state);
        self.trace_flags.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_requires_both_ids() {
        let ok = SpanContext::new(TraceId::from(1), SpanId::from(1), TraceFlags::SAMPLED, false);
        let no_span = SpanContext::new(
            TraceId::from(1),
            SpanId::INVALID,
            TraceFlags::SAMPLED,
            false,
        );
        let no_trace = SpanContext::new(
            TraceId::INVALID,
            SpanId::from(1),
            TraceFlags::SAMPLED,
            false,
        );

        assert!(ok.is_valid());
        assert!(ok.is_sampled());
        assert!(!no_span.is_valid());
        assert!(!no_trace.is_valid());
        assert!(!SpanContext::empty_context().is_valid());
    }

    #[test]
    fn remote_flag_is_not_part_of_identity() {
        let local = SpanContext::new(TraceId::from(7), SpanId::from(8), TraceFlags::SAMPLED, false);
        let remote = SpanContext::new(TraceId::from(7), SpanId::from(8), TraceFlags::SAMPLED, true);
        let unsampled = SpanContext::new(
            TraceId::from(7),
            SpanId::from(8),
            TraceFlags::NOT_SAMPLED,
            true,
        );

        assert_eq!(local, remote);
        assert_ne!(remote, unsampled);
        let set: std::collections::HashSet<_> = [local, remote].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
