//! Export hivetrace spans to stdout.
//!
//! Every exported batch is written as one pretty printed JSON document,
//! spans grouped by resource and then by instrumentation scope:
//!
//! ```no_run
//! use hivetrace::Context;
//! use hivetrace_sdk::trace::TracerProvider;
//!
//! let provider = TracerProvider::builder()
//!     .with_simple_exporter(hivetrace_stdout::SpanExporter::default())
//!     .build();
//!
//! let (_, mut span) = provider.tracer("stdout-example").start(&Context::new(), "work");
//! span.end();
//!
//! // {
//! //   "resourceSpans": [
//! //     {
//! //       "resource": { "attributes": [ { "key": "service.name", ...
//! ```
#![warn(missing_debug_implementations, missing_docs)]

mod exporter;
mod transform;

pub use exporter::{SpanExporter, SpanExporterBuilder};
