use crate::trace::{ExportResult, SpanData, SpanExporter};
use futures_util::future::BoxFuture;
use hivetrace::trace::{TraceError, TraceResult};
use std::sync::{Arc, Mutex};

/// A span exporter that keeps every exported span in memory.
///
/// Clones share the same storage, so a test can hand one clone to the
/// provider and inspect the other.
///
/// ```
/// use hivetrace::Context;
/// use hivetrace_sdk::trace::{InMemorySpanExporter, TracerProvider};
///
/// let exporter = InMemorySpanExporter::default();
/// let provider = TracerProvider::builder()
///     .with_batch_exporter(exporter.clone())
///     .build();
///
/// let tracer = provider.tracer("example/in_memory_exporter");
/// let (_cx, mut span) = tracer.start(&Context::new(), "say hello");
/// span.add_event("handling this...", Vec::new());
/// span.end();
///
/// provider.force_flush().unwrap();
/// let spans = exporter.get_finished_spans().unwrap();
/// assert_eq!(spans.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemorySpanExporter {
    /// Returns the exported spans, in export order.
    ///
    /// # Errors
    ///
    /// Returns a `TraceError` if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|spans_guard| spans_guard.iter().cloned().collect())
            .map_err(TraceError::from)
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        let _ = self.spans.lock().map(|mut spans_guard| spans_guard.clear());
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, mut batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = self
            .spans
            .lock()
            .map(|mut spans_guard| spans_guard.append(&mut batch))
            .map_err(|err| TraceError::from(format!("Failed to lock spans: {err:?}")));
        Box::pin(std::future::ready(result))
    }
}
