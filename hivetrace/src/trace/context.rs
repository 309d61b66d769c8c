use crate::trace::SpanContext;
use crate::Context;

/// Methods for storing and retrieving the enclosing span in a [`Context`].
///
/// The context only holds the span's [`SpanContext`], never the span itself:
/// the task that started a span owns it and is the only one allowed to mutate
/// it, while any number of children may read its identity from the context.
pub trait TraceContextExt {
    /// Returns a copy of this context carrying `span_context` as the
    /// enclosing span.
    fn with_span_context(&self, span_context: SpanContext) -> Self;

    /// Returns a copy of this context carrying a span context that was
    /// received from another process.
    ///
    /// The span context is marked remote regardless of how it was built.
    fn with_remote_span_context(&self, span_context: SpanContext) -> Self;

    /// The enclosing span context, or [`SpanContext::NONE`] when there is none.
    fn span_context(&self) -> &SpanContext;

    /// Returns whether a valid span context is present.
    fn has_active_span(&self) -> bool;
}

impl TraceContextExt for Context {
    fn with_span_context(&self, span_context: SpanContext) -> Self {
        self.with_span_context_internal(span_context)
    }

    fn with_remote_span_context(&self, span_context: SpanContext) -> Self {
        self.with_span_context_internal(SpanContext::new(
            span_context.trace_id(),
            span_context.span_id(),
            span_context.trace_flags(),
            true,
        ))
    }

    fn span_context(&self) -> &SpanContext {
        self.span_context.as_ref().unwrap_or(&SpanContext::NONE)
    }

    fn has_active_span(&self) -> bool {
        self.span_context.is_some_and(|sc| sc.is_valid())
    }
}
