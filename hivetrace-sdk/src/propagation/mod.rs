//! Propagators carrying the span context across process boundaries.
mod trace_context;

pub use trace_context::TraceContextPropagator;
