/// Default maximum number of attributes on a span.
pub(crate) const DEFAULT_MAX_ATTRIBUTES_PER_SPAN: u32 = 128;
/// Default maximum number of events on a span.
pub(crate) const DEFAULT_MAX_EVENTS_PER_SPAN: u32 = 128;
/// Default maximum number of attributes on a single event.
pub(crate) const DEFAULT_MAX_ATTRIBUTES_PER_EVENT: u32 = 128;

/// Upper bounds on what a single span records.
///
/// Anything beyond a limit is dropped and counted in the exported
/// [`SpanData`](crate::trace::SpanData). Overwriting an existing attribute key
/// never counts against the limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct SpanLimits {
    /// The max attributes that can be added to a `Span`.
    pub max_attributes_per_span: u32,
    /// The max events that can be added to a `Span`.
    pub max_events_per_span: u32,
    /// The max attributes that can be added to an `Event`.
    pub max_attributes_per_event: u32,
}

impl Default for SpanLimits {
    fn default() -> Self {
        SpanLimits {
            max_attributes_per_span: DEFAULT_MAX_ATTRIBUTES_PER_SPAN,
            max_events_per_span: DEFAULT_MAX_EVENTS_PER_SPAN,
            max_attributes_per_event: DEFAULT_MAX_ATTRIBUTES_PER_EVENT,
        }
    }
}
