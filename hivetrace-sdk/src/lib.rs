//! Recording and exporting spans for hivetrace.
//!
//! The API crate, `hivetrace`, defines what a span context is and how it
//! travels. This crate does the work behind it:
//!
//! * [`trace::TracerProvider`] is the explicit configuration object built at
//!   process start. It owns the span processors, the sampler, the id
//!   generator and the [`Resource`]. Components that start spans receive it
//!   (or a [`trace::Tracer`]) as a parameter; there is no global provider.
//! * [`trace::Tracer::start`] creates a [`trace::Span`] and returns the child
//!   [`hivetrace::Context`] that nested work has to use.
//! * Ending a span hands an immutable [`trace::SpanData`] to every
//!   [`trace::SpanProcessor`]. The [`trace::BatchSpanProcessor`] buffers them
//!   and exports from a dedicated worker thread so the request path never
//!   waits on exporter I/O.
//! * [`propagation::TraceContextPropagator`] encodes and decodes the
//!   `traceparent` header.
//!
//! ```
//! use hivetrace::trace::TraceContextExt;
//! use hivetrace::Context;
//! use hivetrace_sdk::trace::{InMemorySpanExporter, TracerProvider};
//!
//! let exporter = InMemorySpanExporter::default();
//! let provider = TracerProvider::builder()
//!     .with_simple_exporter(exporter.clone())
//!     .build();
//! let tracer = provider.tracer("readme");
//!
//! let (cx, mut a) = tracer.start(&Context::new(), "A");
//! let (_, mut b) = tracer.start(&cx, "B");
//! assert_eq!(b.span_context().trace_id(), cx.span_context().trace_id());
//! b.end();
//! a.end();
//!
//! let spans = exporter.get_finished_spans().unwrap();
//! assert_eq!(spans.len(), 2);
//! assert_eq!(spans[0].parent_span_id, spans[1].span_context.span_id());
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod propagation;
mod resource;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trace;

pub use resource::{Resource, ResourceBuilder, SERVICE_NAME, SERVICE_VERSION};
