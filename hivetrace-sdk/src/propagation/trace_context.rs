//! # Trace context propagator
//!
//! Encodes a [`SpanContext`] into the `traceparent` header and back.
use hivetrace::propagation::{Extractor, Injector, TextMapPropagator};
use hivetrace::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId};
use hivetrace::Context;

const SUPPORTED_VERSION: u8 = 0;
const INVALID_VERSION: u8 = 0xff;
const TRACEPARENT_HEADER: &str = "traceparent";
const TRACE_CONTEXT_HEADER_FIELDS: &[&str] = &[TRACEPARENT_HEADER];

/// Propagates [`SpanContext`]s in the `traceparent` header.
///
/// The header has four dash separated fields:
///
/// `traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
///
///    - version, two hex digits, always `00` when injecting
///    - trace-id, 32 hex digits
///    - parent-id, the span id of the sender, 16 hex digits
///    - trace-flags, two hex digits; bit 0 is the sampled flag
///
/// Everything is lowercase. Headers from newer versions are accepted as long
/// as their first four fields follow this layout. Anything malformed is
/// treated as absent: the receiver starts a new trace instead of failing the
/// request.
///
/// ```
/// use hivetrace::propagation::TextMapPropagator;
/// use hivetrace::trace::TraceContextExt;
/// use hivetrace_sdk::propagation::TraceContextPropagator;
/// use std::collections::HashMap;
///
/// let mut headers = HashMap::new();
/// headers.insert(
///     "traceparent".to_string(),
///     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
/// );
///
/// let cx = TraceContextPropagator::new().extract(&headers);
/// let sc = cx.span_context();
/// assert_eq!(sc.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
/// assert!(sc.is_sampled() && sc.is_remote());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TraceContextPropagator {
    _private: (),
}

impl TraceContextPropagator {
    /// Create a new `TraceContextPropagator`.
    pub fn new() -> Self {
        TraceContextPropagator { _private: () }
    }

    /// The header value for `span_context`, or `None` if it is not valid.
    pub fn encode(span_context: &SpanContext) -> Option<String> {
        span_context.is_valid().then(|| {
            format!(
                "{:02x}-{}-{}-{:02x}",
                SUPPORTED_VERSION,
                span_context.trace_id(),
                span_context.span_id(),
                TraceFlags::default().with_sampled(span_context.is_sampled())
            )
        })
    }

    /// Decodes a `traceparent` value. The result is marked remote.
    pub fn decode(header_value: &str) -> Option<SpanContext> {
        let parts = header_value.trim().split('-').collect::<Vec<&str>>();
        // Ensure parts are not out of range.
        if parts.len() < 4 {
            return None;
        }

        // Ensure version is within range, for version 0 there must be 4 parts.
        let version = parse_lower_hex(parts[0], 2)? as u8;
        if version == INVALID_VERSION || version == SUPPORTED_VERSION && parts.len() != 4 {
            return None;
        }

        let trace_id = TraceId::from(parse_lower_hex(parts[1], 32)?);
        let span_id = SpanId::from(parse_lower_hex(parts[2], 16)? as u64);
        let flags = parse_lower_hex(parts[3], 2)? as u8;

        // Build trace flags clearing everything but the sampled bit.
        let trace_flags = TraceFlags::default().with_sampled(TraceFlags::new(flags).is_sampled());
        let span_context = SpanContext::new(trace_id, span_id, trace_flags, true);

        // Ensure span is valid
        span_context.is_valid().then_some(span_context)
    }

    /// Extract span context from the `traceparent` header.
    pub fn extract_span_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        extractor.get(TRACEPARENT_HEADER).and_then(Self::decode)
    }
}

// `u128::from_str_radix` alone would accept uppercase digits and a sign.
fn parse_lower_hex(field: &str, width: usize) -> Option<u128> {
    if field.len() != width
        || !field
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    u128::from_str_radix(field, 16).ok()
}

impl TextMapPropagator for TraceContextPropagator {
    /// Writes `traceparent` when `cx` carries a valid span context.
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        if let Some(header_value) = Self::encode(cx.span_context()) {
            injector.set(TRACEPARENT_HEADER, header_value);
        }
    }

    /// Returns `cx` with the extracted span context marked remote, or `cx`
    /// unchanged when the header is missing or malformed.
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.extract_span_context(extractor)
            .map(|sc| cx.with_remote_span_context(sc))
            .unwrap_or_else(|| cx.clone())
    }

    fn fields(&self) -> &'static [&'static str] {
        TRACE_CONTEXT_HEADER_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    const TRACE_ID: u128 = 0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736;
    const SPAN_ID: u64 = 0x00f0_67aa_0ba9_02b7;

    fn expected(sampled: bool) -> SpanContext {
        SpanContext::new(
            TraceId::from(TRACE_ID),
            SpanId::from(SPAN_ID),
            TraceFlags::default().with_sampled(sampled),
            true,
        )
    }

    #[rstest]
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00", false)]
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", true)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", true)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09", true)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-08", false)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09-XYZxsf09", true)]
    #[case("01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09-", true)]
    #[case("  00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01 ", true)]
    fn extract_valid(#[case] header: &str, #[case] sampled: bool) {
        assert_eq!(TraceContextPropagator::decode(header), Some(expected(sampled)));
    }

    #[rustfmt::skip]
    #[rstest]
    #[case("0000-00000000000000000000000000000000-0000000000000000-01")] // wrong version length
    #[case("00-ab00000000000000000000000000000000-cd00000000000000-01")] // wrong trace ID length
    #[case("00-ab000000000000000000000000000000-cd0000000000000000-01")] // wrong span ID length
    #[case("00-ab000000000000000000000000000000-cd00000000000000-0100")] // wrong trace flag length
    #[case("qw-00000000000000000000000000000000-0000000000000000-01")]   // bogus version
    #[case("00-qw000000000000000000000000000000-cd00000000000000-01")]   // bogus trace ID
    #[case("00-ab000000000000000000000000000000-qw00000000000000-01")]   // bogus span ID
    #[case("00-ab000000000000000000000000000000-cd00000000000000-qw")]   // bogus trace flag
    #[case("A0-00000000000000000000000000000000-0000000000000000-01")]   // upper case version
    #[case("00-AB000000000000000000000000000000-cd00000000000000-01")]   // upper case trace ID
    #[case("00-ab000000000000000000000000000000-CD00000000000000-01")]   // upper case span ID
    #[case("00-ab000000000000000000000000000000-cd00000000000000-A1")]   // upper case trace flag
    #[case("00-00000000000000000000000000000000-cd00000000000000-01")]   // zero trace ID
    #[case("00-ab000000000000000000000000000000-0000000000000000-01")]   // zero span ID
    #[case("ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")]   // forbidden version
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7")]      // missing options
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-")]     // empty options
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-")]  // trailing field on version 0
    #[case("00-+bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")]   // sign in trace ID
    #[case("not a traceparent at all")]
    #[case("")]
    fn extract_invalid(#[case] header: &str) {
        assert_eq!(TraceContextPropagator::decode(header), None);
    }

    #[test]
    fn inject_then_extract() {
        let propagator = TraceContextPropagator::new();
        let local = SpanContext::new(
            TraceId::from(TRACE_ID),
            SpanId::from(SPAN_ID),
            TraceFlags::SAMPLED,
            false,
        );
        let mut carrier = HashMap::new();
        propagator.inject_context(&Context::new().with_span_context(local), &mut carrier);

        assert_eq!(
            carrier.get(TRACEPARENT_HEADER).map(String::as_str),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );

        let extracted = propagator.extract(&carrier);
        assert_eq!(extracted.span_context(), &local);
        assert!(extracted.span_context().is_remote());
    }

    #[rstest]
    #[case(TraceFlags::SAMPLED)]
    #[case(TraceFlags::NOT_SAMPLED)]
    fn decode_reverses_encode(#[case] flags: TraceFlags) {
        let local = SpanContext::new(TraceId::from(TRACE_ID), SpanId::from(SPAN_ID), flags, false);
        let header = TraceContextPropagator::encode(&local).unwrap();
        assert_eq!(TraceContextPropagator::decode(&header), Some(local));
    }

    #[test]
    fn inject_nothing_without_span_context() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        TraceContextPropagator::new().inject_context(&Context::new(), &mut carrier);
        assert!(carrier.is_empty());
    }

    #[test]
    fn unsampled_flag_is_encoded() {
        let sc = SpanContext::new(
            TraceId::from(1),
            SpanId::from(2),
            TraceFlags::NOT_SAMPLED,
            false,
        );
        assert_eq!(
            TraceContextPropagator::encode(&sc).as_deref(),
            Some("00-00000000000000000000000000000001-0000000000000002-00")
        );
        assert_eq!(TraceContextPropagator::encode(&SpanContext::NONE), None);
    }

    #[test]
    fn garbage_header_keeps_the_given_context() {
        #[derive(Debug, PartialEq)]
        struct Marker;

        let mut carrier = HashMap::new();
        carrier.insert(TRACEPARENT_HEADER.to_string(), "garbage".to_string());
        let cx = Context::new().with_value(Marker);

        let extracted = TraceContextPropagator::new().extract_with_context(&cx, &carrier);
        assert!(!extracted.has_active_span());
        assert_eq!(extracted.get::<Marker>(), Some(&Marker));
    }

    #[test]
    fn fields_name_the_header() {
        assert_eq!(TraceContextPropagator::new().fields(), &["traceparent"]);
    }
}
