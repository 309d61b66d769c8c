//! # Trace SDK
//!
//! The trace SDK records spans started through a [`Tracer`] and ships them to
//! a [`SpanExporter`]:
//!
//! * The [`TracerProvider`] holds the [`Config`] and the span processors.
//! * A [`Tracer`] starts [`Span`]s; each span is owned by the code that
//!   started it.
//! * Ending a span produces a [`SpanData`] handed to every [`SpanProcessor`],
//!   which eventually passes it to an exporter.
mod config;
mod export;
mod id_generator;
mod in_memory_exporter;
mod provider;
mod sampler;
mod span;
mod span_limit;
mod span_processor;
mod tracer;

pub use config::Config;
pub use export::{ExportResult, SpanData, SpanExporter};
#[cfg(any(test, feature = "testing"))]
pub use id_generator::IncrementIdGenerator;
pub use id_generator::{IdGenerator, RandomIdGenerator};
pub use in_memory_exporter::InMemorySpanExporter;
pub use provider::{TracerProvider, TracerProviderBuilder};
pub use sampler::{Sampler, SamplingDecision};
pub use span::{SharedSpan, Span};
pub use span_limit::SpanLimits;
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use tracer::{InstrumentationScope, SpanBuilder, Tracer};
