//! Helpers for testing code that records spans.

/// Span fixtures, a scriptable exporter and trace shape checks.
pub mod trace;
