//! Span identity, span metadata and the errors raised by the tracing pipeline.
//!
//! A trace is the tree of spans sharing one [`TraceId`]. Each span is
//! identified within it by a [`SpanId`]; the pair together with the
//! [`TraceFlags`] forms the [`SpanContext`], which is the only part of a span
//! that crosses process boundaries.
//!
//! [`TraceContextExt`] lets a [`Context`](crate::Context) carry the span
//! context of the span enclosing the current unit of work.

use std::borrow::Cow;
use std::time;
use thiserror::Error;

mod context;
mod event;
mod span_context;

pub use crate::trace_context::{SpanId, TraceFlags, TraceId};
pub use context::TraceContextExt;
pub use event::Event;
pub use span_context::SpanContext;

/// The role a span plays in the request it describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// The outgoing half of a remote call.
    Client,
    /// The receiving half of a remote call.
    Server,
    /// In-process work with no remote counterpart.
    #[default]
    Internal,
}

/// The outcome recorded on a span.
///
/// Statuses are ordered `Ok > Error > Unset`. Setting a status that ranks
/// below the current one has no effect, so instrumentation that marks a span
/// `Error` can not hide an application's explicit `Ok`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// No status has been recorded.
    #[default]
    Unset,

    /// The operation failed.
    Error {
        /// Human readable reason.
        description: Cow<'static, str>,
    },

    /// The operation was explicitly marked successful.
    Ok,
}

impl Status {
    /// Create an error status with the given description.
    ///
    /// ```
    /// use hivetrace::trace::Status;
    ///
    /// assert!(Status::error("upstream returned 502") > Status::Unset);
    /// assert!(Status::Ok > Status::error("upstream returned 502"));
    /// ```
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// Describe the result of operations in the tracing pipeline.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the tracing pipeline.
///
/// None of these ever reach the code path that produced a span: processors
/// log and count export problems and only surface them from explicit
/// `force_flush` and `shutdown` calls.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Export failed with the error returned by the exporter
    #[error("Exporter {name} encountered the following error(s): {0}", name = .0.exporter_name())]
    ExportFailed(Box<dyn ExportError>),

    /// Export did not finish in time and the caller stopped waiting.
    #[error("Exporting timed out after {} ms", .0.as_millis())]
    ExportTimedOut(time::Duration),

    /// The provider or processor was already shut down.
    #[error("Already shut down")]
    AlreadyShutdown,

    /// A span was modified after it ended.
    #[error("Span already ended")]
    SpanEnded,

    /// Other errors propagated from the tracing pipeline
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// An error raised by an exporter, tagged with the exporter that raised it.
pub trait ExportError: std::error::Error + Send + Sync + 'static {
    /// The name of the exporter returning the error.
    fn exporter_name(&self) -> &'static str;
}

impl<T> From<T> for TraceError
where
    T: ExportError,
{
    fn from(err: T) -> Self {
        TraceError::ExportFailed(Box::new(err))
    }
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for TraceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        TraceError::Other(err.to_string().into())
    }
}
