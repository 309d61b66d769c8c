use crate::trace::{ExportResult, InstrumentationScope, SpanData, SpanExporter};
use crate::Resource;
use futures_util::future::BoxFuture;
use hivetrace::trace::{
    ExportError, SpanContext, SpanId, SpanKind, Status, TraceFlags, TraceId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A finished root span with unique ids, ready to hand to a processor.
pub fn new_test_span_data(sampled: bool) -> SpanData {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let now = SystemTime::now();
    SpanData {
        span_context: SpanContext::new(
            TraceId::from(u128::from(id)),
            SpanId::from(id),
            TraceFlags::default().with_sampled(sampled),
            false,
        ),
        parent_span_id: SpanId::INVALID,
        span_kind: SpanKind::Internal,
        name: "hivetrace".into(),
        start_time: now,
        end_time: now,
        attributes: Vec::new(),
        dropped_attributes_count: 0,
        events: Vec::new(),
        dropped_events_count: 0,
        status: Status::Unset,
        resource: Arc::new(Resource::empty()),
        instrumentation_scope: InstrumentationScope::new("hivetrace-sdk/testing"),
    }
}

/// Error returned by [`TestSpanExporter`] while it is scripted to fail.
#[derive(Debug)]
pub struct TestExportError(pub String);

impl fmt::Display for TestExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TestExportError {}

impl ExportError for TestExportError {
    fn exporter_name(&self) -> &'static str {
        "test"
    }
}

#[derive(Debug, Default)]
struct TestExporterState {
    spans: Vec<SpanData>,
    batch_sizes: Vec<usize>,
    export_calls: usize,
    failures_left: usize,
    is_shutdown: bool,
}

/// A scriptable exporter recording how it was called.
///
/// It can fail its first `n` exports and delay each export, which is enough
/// to drive the retry and timeout paths of the batch processor. Clones share
/// their state.
#[derive(Clone, Debug, Default)]
pub struct TestSpanExporter {
    state: Arc<Mutex<TestExporterState>>,
    delay: Option<Duration>,
}

impl TestSpanExporter {
    /// An exporter whose first `failures` exports fail.
    pub fn failing(failures: usize) -> Self {
        let exporter = TestSpanExporter::default();
        if let Ok(mut state) = exporter.state.lock() {
            state.failures_left = failures;
        }
        exporter
    }

    /// An exporter that takes `delay` to finish each export.
    pub fn with_delay(delay: Duration) -> Self {
        TestSpanExporter {
            delay: Some(delay),
            ..TestSpanExporter::default()
        }
    }

    /// Spans exported successfully, in export order.
    pub fn exported_spans(&self) -> Vec<SpanData> {
        self.read(|state| state.spans.clone())
    }

    /// Size of every batch passed to `export`, failed ones included.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.read(|state| state.batch_sizes.clone())
    }

    /// Number of `export` calls, failed ones included.
    pub fn export_calls(&self) -> usize {
        self.read(|state| state.export_calls)
    }

    /// Whether `shutdown` was called.
    pub fn is_shutdown(&self) -> bool {
        self.read(|state| state.is_shutdown)
    }

    fn read<T: Default>(&self, f: impl FnOnce(&TestExporterState) -> T) -> T {
        self.state.lock().map(|state| f(&state)).unwrap_or_default()
    }
}

impl SpanExporter for TestSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let state = self.state.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                futures_timer::Delay::new(delay).await;
            }
            let mut state = state.lock()?;
            state.export_calls += 1;
            state.batch_sizes.push(batch.len());
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(TestExportError("scripted failure".into()).into());
            }
            state.spans.extend(batch);
            Ok(())
        })
    }

    fn shutdown(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.is_shutdown = true;
        }
    }
}

/// A structural problem in a set of finished spans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanAnomaly {
    /// The child ended after its parent.
    ChildOutlivesParent {
        /// Parent span id.
        parent: SpanId,
        /// Child span id.
        child: SpanId,
    },
    /// The child started before its parent.
    ChildStartsBeforeParent {
        /// Parent span id.
        parent: SpanId,
        /// Child span id.
        child: SpanId,
    },
    /// The child points at a parent that belongs to a different trace.
    TraceMismatch {
        /// Parent span id.
        parent: SpanId,
        /// Child span id.
        child: SpanId,
    },
    /// Two spans share a span id.
    DuplicateSpanId(SpanId),
}

/// Checks that the parent/child links among `spans` form a proper tree.
///
/// Parents missing from `spans`, typically remote ones, are not reported.
pub fn find_span_anomalies(spans: &[SpanData]) -> Vec<SpanAnomaly> {
    let mut anomalies = Vec::new();
    let mut by_id: HashMap<SpanId, &SpanData> = HashMap::with_capacity(spans.len());
    for span in spans {
        let span_id = span.span_context.span_id();
        if by_id.insert(span_id, span).is_some() {
            anomalies.push(SpanAnomaly::DuplicateSpanId(span_id));
        }
    }

    for child in spans {
        let Some(parent) = by_id.get(&child.parent_span_id) else {
            continue;
        };
        let (parent_id, child_id) = (parent.span_context.span_id(), child.span_context.span_id());
        if parent.span_context.trace_id() != child.span_context.trace_id() {
            anomalies.push(SpanAnomaly::TraceMismatch {
                parent: parent_id,
                child: child_id,
            });
        }
        if child.start_time < parent.start_time {
            anomalies.push(SpanAnomaly::ChildStartsBeforeParent {
                parent: parent_id,
                child: child_id,
            });
        }
        if child.end_time > parent.end_time {
            anomalies.push(SpanAnomaly::ChildOutlivesParent {
                parent: parent_id,
                child: child_id,
            });
        }
    }
    anomalies
}
