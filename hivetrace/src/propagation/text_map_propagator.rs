use crate::propagation::{Extractor, Injector};
use crate::Context;
use std::fmt::Debug;

/// Encodes the trace part of a [`Context`] into string key-value carriers and
/// decodes it back.
///
/// Implementations must never fail: a carrier that holds nothing usable
/// yields the context unchanged on extract, so the receiving side starts a
/// new trace instead of rejecting the request.
pub trait TextMapPropagator: Debug + Send + Sync {
    /// Writes the span context carried by `cx` into `injector`.
    ///
    /// Nothing is written when `cx` has no valid span context.
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector);

    /// Reads a span context from `extractor` into a copy of `cx`.
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context;

    /// Reads a span context from `extractor` into a fresh [`Context`].
    fn extract(&self, extractor: &dyn Extractor) -> Context {
        self.extract_with_context(&Context::new(), extractor)
    }

    /// The carrier keys this propagator reads and writes.
    fn fields(&self) -> &'static [&'static str];
}
