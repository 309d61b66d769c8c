//! # Tracer provider
//!
//! The [`TracerProvider`] is built once at process start and passed to the
//! components that start spans. It owns the span processors and the
//! [`Config`]; every [`Tracer`] it hands out shares both.
//!
//! ```
//! use hivetrace_sdk::trace::{InMemorySpanExporter, TracerProvider};
//! use hivetrace_sdk::Resource;
//!
//! let provider = TracerProvider::builder()
//!     .with_batch_exporter(InMemorySpanExporter::default())
//!     .with_resource(
//!         Resource::builder_empty()
//!             .with_service_name("hello-server")
//!             .with_service_version("0.0.1")
//!             .build(),
//!     )
//!     .build();
//!
//! // create spans..
//!
//! provider.shutdown().unwrap();
//! ```
use crate::trace::{
    BatchSpanProcessor, Config, IdGenerator, InstrumentationScope, Sampler, SimpleSpanProcessor,
    SpanExporter, SpanLimits, SpanProcessor, Tracer,
};
use crate::Resource;
use hivetrace::trace::{TraceError, TraceResult};
use hivetrace::{hive_debug, hive_info};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct TracerProviderInner {
    processors: Vec<Box<dyn SpanProcessor>>,
    config: Config,
    is_shutdown: AtomicBool,
}

impl TracerProviderInner {
    fn shutdown(&self) -> Vec<TraceResult<()>> {
        self.processors
            .iter()
            .map(|processor| {
                let result = processor.shutdown();
                if let Err(err) = &result {
                    hive_debug!(
                        name: "TracerProvider.ShutdownError",
                        error = err.to_string()
                    );
                }
                result
            })
            .collect()
    }
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown();
        } else {
            hive_debug!(
                name: "TracerProvider.Drop.AlreadyShutdown",
                message = "already shut down, nothing to flush on drop"
            );
        }
    }
}

/// Creator of [`Tracer`]s sharing one set of span processors and one
/// [`Config`].
///
/// Cloning is cheap and every clone refers to the same pipeline. Span
/// processing stops when [`shutdown`](TracerProvider::shutdown) is called or
/// when the last clone, including the ones held by tracers and live spans, is
/// dropped.
#[derive(Clone, Debug)]
pub struct TracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl Default for TracerProvider {
    fn default() -> Self {
        TracerProvider::builder().build()
    }
}

impl TracerProvider {
    /// Create a new [`TracerProvider`] builder.
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// A tracer identified by `name`.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        self.tracer_with_scope(InstrumentationScope::new(name))
    }

    /// A tracer identified by `scope`.
    pub fn tracer_with_scope(&self, scope: InstrumentationScope) -> Tracer {
        if scope.name().is_empty() {
            hive_info!(
                name: "TracerNameEmpty",
                message = "tracer name is empty, spans will carry an empty scope name"
            );
        }
        Tracer::new(scope, self.clone())
    }

    pub(crate) fn span_processors(&self) -> &[Box<dyn SpanProcessor>] {
        &self.inner.processors
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    /// true once `shutdown` was called. Spans started afterwards don't record.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Relaxed)
    }

    /// Exports every span that ended so far, waiting for each processor.
    pub fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown() {
            return Err(TraceError::AlreadyShutdown);
        }
        collect_errors(
            "force flush",
            self.span_processors()
                .iter()
                .map(|processor| processor.force_flush())
                .collect(),
        )
    }

    /// Flushes and stops every processor.
    ///
    /// Spans that already ended are exported, or counted as dropped when a
    /// processor runs out of time. Only the first call does anything; later
    /// ones return [`TraceError::AlreadyShutdown`].
    pub fn shutdown(&self) -> TraceResult<()> {
        if self
            .inner
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            collect_errors("shutdown", self.inner.shutdown())
        } else {
            Err(TraceError::AlreadyShutdown)
        }
    }
}

// A single failure is returned as is so callers can match on it.
fn collect_errors(operation: &str, results: Vec<TraceResult<()>>) -> TraceResult<()> {
    let mut errors: Vec<TraceError> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(TraceError::from(format!(
            "{operation} errors: {}",
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ))),
    }
}

/// Builder for [`TracerProvider`].
#[derive(Debug, Default)]
pub struct TracerProviderBuilder {
    processors: Vec<Box<dyn SpanProcessor>>,
    config: Config,
}

impl TracerProviderBuilder {
    /// Adds a [`SimpleSpanProcessor`] exporting each span as it ends.
    ///
    /// Meant for tests and debugging: the thread ending the span waits for
    /// the export.
    pub fn with_simple_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(SimpleSpanProcessor::new(Box::new(exporter)))
    }

    /// Adds a [`BatchSpanProcessor`] with the configuration read from the
    /// environment.
    pub fn with_batch_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(BatchSpanProcessor::builder(exporter).build())
    }

    /// Adds a span processor. Processors see spans in the order they were
    /// added.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(self, config: Config) -> Self {
        TracerProviderBuilder { config, ..self }
    }

    /// The sampler deciding which spans record.
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.config.sampler = sampler;
        self
    }

    /// The id generator for new traces and spans.
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, id_generator: T) -> Self {
        self.config.id_generator = Box::new(id_generator);
        self
    }

    /// Maximum number of events per span.
    pub fn with_max_events_per_span(mut self, max_events: u32) -> Self {
        self.config.span_limits.max_events_per_span = max_events;
        self
    }

    /// Maximum number of attributes per span.
    pub fn with_max_attributes_per_span(mut self, max_attributes: u32) -> Self {
        self.config.span_limits.max_attributes_per_span = max_attributes;
        self
    }

    /// Maximum number of attributes per event.
    pub fn with_max_attributes_per_event(mut self, max_attributes: u32) -> Self {
        self.config.span_limits.max_attributes_per_event = max_attributes;
        self
    }

    /// All span limits at once.
    pub fn with_span_limits(mut self, span_limits: SpanLimits) -> Self {
        self.config.span_limits = span_limits;
        self
    }

    /// The [`Resource`] attached to every exported span.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.config.resource = Arc::new(resource);
        self
    }

    /// Create a new provider from this configuration.
    pub fn build(self) -> TracerProvider {
        TracerProvider {
            inner: Arc::new(TracerProviderInner {
                processors: self.processors,
                config: self.config,
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}
