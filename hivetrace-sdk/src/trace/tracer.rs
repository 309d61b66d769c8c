//! # Tracer
//!
//! A [`Tracer`] starts spans on behalf of one instrumented component. Parent
//! and child are linked through an explicit [`Context`]: the caller passes the
//! context it is running in, and `start` returns the child context that nested
//! work has to receive. Nothing is stored in thread-locals, so a context handed
//! to another task or thread stays correct there.
use crate::trace::span::{record_attribute, SpanRecord};
use crate::trace::{SamplingDecision, Span, SpanLimits, TracerProvider};
use hivetrace::trace::{SpanContext, SpanId, SpanKind, Status, TraceContextExt, TraceFlags};
use hivetrace::{Context, KeyValue};
use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// Identifies the component that created a span.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstrumentationScope {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
}

impl InstrumentationScope {
    /// Scope with the given name and no version.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        InstrumentationScope {
            name: name.into(),
            version: None,
        }
    }

    /// Set the version of the instrumenting component.
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The name of the instrumenting component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version of the instrumenting component, if set.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Creates spans. Obtained from [`TracerProvider::tracer`].
#[derive(Clone)]
pub struct Tracer {
    scope: InstrumentationScope,
    provider: TracerProvider,
}

impl fmt::Debug for Tracer {
    /// Omits `provider` to avoid cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("name", &self.scope.name())
            .field("version", &self.scope.version())
            .finish()
    }
}

impl Tracer {
    pub(crate) fn new(scope: InstrumentationScope, provider: TracerProvider) -> Self {
        Tracer { scope, provider }
    }

    pub(crate) fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    /// Instrumentation scope of this tracer.
    pub fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Starts an `Internal` span named `name` as a child of the span carried
    /// by `parent_cx`, or as a new trace root when there is none.
    ///
    /// Returns the child context, carrying the new span's [`SpanContext`],
    /// together with the span itself. Pass the returned context to any work
    /// nested under the span.
    pub fn start<T>(&self, parent_cx: &Context, name: T) -> (Context, Span)
    where
        T: Into<Cow<'static, str>>,
    {
        self.build_with_context(SpanBuilder::from_name(name), parent_cx)
    }

    /// Creates a [`SpanBuilder`] for a span named `name`.
    pub fn span_builder<T>(&self, name: T) -> SpanBuilder
    where
        T: Into<Cow<'static, str>>,
    {
        SpanBuilder::from_name(name)
    }

    /// Starts a span, runs `f` with the child context and the span, and ends
    /// the span when `f` returns.
    ///
    /// ```
    /// use hivetrace::Context;
    /// use hivetrace_sdk::trace::TracerProvider;
    ///
    /// let provider = TracerProvider::builder().build();
    /// let tracer = provider.tracer("in-span");
    /// let answer = tracer.in_span(&Context::new(), "compute", |_cx, span| {
    ///     span.add_event("computing", vec![]);
    ///     42
    /// });
    /// assert_eq!(answer, 42);
    /// ```
    pub fn in_span<T, F, N>(&self, parent_cx: &Context, name: N, f: F) -> T
    where
        F: FnOnce(&Context, &mut Span) -> T,
        N: Into<Cow<'static, str>>,
    {
        let (cx, mut span) = self.start(parent_cx, name);
        let result = f(&cx, &mut span);
        span.end();
        result
    }

    /// Starts a span from a [`SpanBuilder`].
    ///
    /// The trace id is inherited from the parent when `parent_cx` carries a
    /// valid span context, local or remote; otherwise a fresh one is drawn.
    /// The span id is always fresh. The configured sampler then decides
    /// whether the span records.
    pub fn build_with_context(
        &self,
        mut builder: SpanBuilder,
        parent_cx: &Context,
    ) -> (Context, Span) {
        let provider = self.provider();
        // no point starting a span once the provider is shut down
        if provider.is_shutdown() {
            let span = Span::new(
                SpanContext::empty_context(),
                None,
                self.clone(),
                SpanLimits::default(),
            );
            return (parent_cx.clone(), span);
        }

        let config = provider.config();
        let parent = parent_cx
            .has_active_span()
            .then(|| *parent_cx.span_context());
        let trace_id = match parent {
            Some(psc) => psc.trace_id(),
            None => config.id_generator.new_trace_id(),
        };
        let span_id = config.id_generator.new_span_id();

        let decision = config.sampler.should_sample(parent.as_ref(), trace_id);
        let parent_flags = parent.map(|psc| psc.trace_flags()).unwrap_or_default();
        let (trace_flags, recording) = match decision {
            SamplingDecision::RecordAndSample => (parent_flags.with_sampled(true), true),
            SamplingDecision::Drop => (TraceFlags::default(), false),
        };
        let span_context = SpanContext::new(trace_id, span_id, trace_flags, false);
        let span_limits = config.span_limits;

        let data = recording.then(|| {
            let mut data = SpanRecord {
                parent_span_id: parent.map(|psc| psc.span_id()).unwrap_or(SpanId::INVALID),
                span_kind: builder.span_kind,
                name: builder.name,
                start_time: builder.start_time.unwrap_or_else(SystemTime::now),
                attributes: Vec::new(),
                dropped_attributes_count: 0,
                events: Vec::new(),
                dropped_events_count: 0,
                status: Status::Unset,
            };
            let limit = span_limits.max_attributes_per_span as usize;
            for attribute in builder.attributes.drain(..) {
                record_attribute(&mut data, attribute, limit);
            }
            data
        });

        let mut span = Span::new(span_context, data, self.clone(), span_limits);
        if span.is_recording() {
            for processor in provider.span_processors() {
                processor.on_start(&mut span, parent_cx);
            }
        }

        (parent_cx.with_span_context(span_context), span)
    }
}

/// Options for a span that is about to start.
///
/// ```
/// use hivetrace::trace::SpanKind;
/// use hivetrace::{Context, KeyValue};
/// use hivetrace_sdk::trace::TracerProvider;
///
/// let provider = TracerProvider::builder().build();
/// let tracer = provider.tracer("builder");
/// let (_cx, span) = tracer
///     .span_builder("GET /hello")
///     .with_kind(SpanKind::Server)
///     .with_attributes([KeyValue::new("http.request.method", "GET")])
///     .start(&tracer, &Context::new());
/// assert!(span.is_recording());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    name: Cow<'static, str>,
    span_kind: SpanKind,
    attributes: Vec<KeyValue>,
    start_time: Option<SystemTime>,
}

impl SpanBuilder {
    /// A builder for an `Internal` span named `name`.
    pub fn from_name<T: Into<Cow<'static, str>>>(name: T) -> Self {
        SpanBuilder {
            name: name.into(),
            ..SpanBuilder::default()
        }
    }

    /// Set the span kind.
    pub fn with_kind(self, span_kind: SpanKind) -> Self {
        SpanBuilder { span_kind, ..self }
    }

    /// Attributes recorded from the start; they count against the span's
    /// attribute limit like any other.
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.attributes.extend(attributes);
        self
    }

    /// Use `start_time` instead of the current time.
    pub fn with_start_time(self, start_time: SystemTime) -> Self {
        SpanBuilder {
            start_time: Some(start_time),
            ..self
        }
    }

    /// Start the span with `tracer`, as a child of `parent_cx`.
    pub fn start(self, tracer: &Tracer, parent_cx: &Context) -> (Context, Span) {
        tracer.build_with_context(self, parent_cx)
    }
}
