//! The boundary between span processors and whatever ships spans out of the
//! process.
use crate::trace::InstrumentationScope;
use crate::Resource;
use futures_util::future::BoxFuture;
use hivetrace::trace::{Event, SpanContext, SpanId, SpanKind, Status, TraceError};
use hivetrace::KeyValue;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

/// Describes the result of an export.
pub type ExportResult = Result<(), TraceError>;

/// `SpanExporter` is the capability span processors hand finished spans to.
///
/// The exporter is a plain encoder and transmitter: batching, timeouts and
/// retries are the processor's job. A processor never calls `export`
/// concurrently on the same instance; the next call only happens once the
/// previous future resolved.
///
/// Exporters must not block indefinitely. The batch processor gives up on an
/// export after its configured timeout and counts the batch as failed.
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of finished spans.
    ///
    /// The batch is moved into the exporter. Returning an error never reaches
    /// the code that produced the spans; the processor logs it, may retry with
    /// a clone of the batch, and eventually counts the batch as lost.
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult>;

    /// Shuts down the exporter. Called once when the owning processor shuts
    /// down; later exports should fail.
    fn shutdown(&mut self) {}

    /// Asks the exporter to push out anything it buffered itself.
    fn force_flush(&mut self) -> BoxFuture<'static, ExportResult> {
        Box::pin(async { Ok(()) })
    }
}

/// Everything recorded about one finished span.
///
/// This is the read-only form of a span once `end` was called. Processors and
/// exporters only ever see this type.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Identity of the span.
    pub span_context: SpanContext,
    /// Span id of the parent, [`SpanId::INVALID`] for a trace root.
    pub parent_span_id: SpanId,
    /// Span kind
    pub span_kind: SpanKind,
    /// Span name
    pub name: Cow<'static, str>,
    /// Span start time
    pub start_time: SystemTime,
    /// Span end time, never earlier than `start_time`.
    pub end_time: SystemTime,
    /// Span attributes, one entry per key.
    pub attributes: Vec<KeyValue>,
    /// Attributes rejected by the per-span limit.
    pub dropped_attributes_count: u32,
    /// Span events in the order they were added.
    pub events: Vec<Event>,
    /// Events rejected by the per-span limit.
    pub dropped_events_count: u32,
    /// Span status
    pub status: Status,
    /// The producer of this span.
    pub resource: Arc<Resource>,
    /// The tracer that created this span.
    pub instrumentation_scope: InstrumentationScope,
}

impl SpanData {
    /// True for the first span of a trace.
    pub fn is_root(&self) -> bool {
        self.parent_span_id == SpanId::INVALID
    }
}
