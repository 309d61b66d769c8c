//! Trace context primitives for hivetrace.
//!
//! This crate holds everything a library needs to participate in a
//! distributed trace without recording anything itself:
//!
//! - [`trace::TraceId`], [`trace::SpanId`], [`trace::TraceFlags`] and the
//!   immutable [`trace::SpanContext`] built from them.
//! - [`Context`], an immutable request-scoped carrier. Every update returns a
//!   new value, there is no thread-local "current" context; callers pass the
//!   context they were given to whatever they call next.
//! - [`KeyValue`] attributes, [`trace::Event`], [`trace::Status`] and
//!   [`trace::SpanKind`].
//! - The [`propagation`] traits used to move a span context across process
//!   boundaries.
//!
//! Recording, sampling, batching and exporting live in `hivetrace-sdk`.
//!
//! ```
//! use hivetrace::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId};
//! use hivetrace::Context;
//!
//! let parent = SpanContext::new(
//!     TraceId::from(0x4bf92f3577b34da6a3ce929d0e0e4736),
//!     SpanId::from(0x00f067aa0ba902b7),
//!     TraceFlags::SAMPLED,
//!     true,
//! );
//! let cx = Context::new().with_remote_span_context(parent);
//!
//! assert!(cx.has_active_span());
//! assert!(!Context::new().has_active_span());
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

mod common;
mod context;
mod internal_logging;
mod trace_context;

pub mod propagation;
pub mod trace;

pub use common::{Key, KeyValue, Value};
pub use context::Context;

#[doc(hidden)]
#[cfg(feature = "internal-logs")]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}
