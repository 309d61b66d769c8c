//! Request interceptors.
//!
//! An [`InterceptorChain`] is assembled once, when the server is built, from
//! an ordered list of [`Interceptor`]s and the [`Endpoint`] that produces the
//! response. Each interceptor receives the request together with a [`Next`]
//! handle; calling [`Next::run`] hands the request to the following
//! interceptor, or to the endpoint once the list is exhausted. Whatever an
//! interceptor does after `run` returns sees the final response.
use crate::{Bytes, HeaderExtractor, Request, Response};
use futures_util::future::BoxFuture;
use hivetrace::propagation::TextMapPropagator;
use hivetrace::trace::{SpanKind, Status};
use hivetrace::{hive_debug, Context, KeyValue};
use hivetrace_sdk::propagation::TraceContextPropagator;
use hivetrace_sdk::trace::{SharedSpan, Tracer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Produces the response for a request once every interceptor ran.
///
/// Implemented for any `Fn(Request<Bytes>) -> impl Future<Output = Response<Bytes>>`.
pub trait Endpoint: Send + Sync {
    /// Handle `request`.
    fn call(&self, request: Request<Bytes>) -> BoxFuture<'static, Response<Bytes>>;
}

impl<F, Fut> Endpoint for F
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Response<Bytes>> + Send + 'static,
{
    fn call(&self, request: Request<Bytes>) -> BoxFuture<'static, Response<Bytes>> {
        Box::pin(self(request))
    }
}

/// A step wrapped around the endpoint.
///
/// An interceptor may rewrite the request, answer on its own without calling
/// `next`, or inspect the response returned by `next.run(request)`.
pub trait Interceptor: Send + Sync + fmt::Debug {
    /// Process `request`, usually by delegating to `next`.
    fn call<'a>(&'a self, request: Request<Bytes>, next: Next<'a>)
        -> BoxFuture<'a, Response<Bytes>>;
}

/// The rest of the chain, as seen from one interceptor.
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Endpoint,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_interceptors", &self.interceptors.len())
            .finish()
    }
}

impl<'a> Next<'a> {
    /// Pass `request` to the next interceptor, or to the endpoint.
    pub fn run(self, request: Request<Bytes>) -> BoxFuture<'a, Response<Bytes>> {
        match self.interceptors.split_first() {
            Some((interceptor, rest)) => interceptor.call(
                request,
                Next {
                    interceptors: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(request),
        }
    }
}

/// Interceptors and an endpoint composed into a request handler.
///
/// Cloning is cheap; every clone shares the same interceptors.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    endpoint: Arc<dyn Endpoint>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

impl InterceptorChain {
    /// Start assembling a chain.
    pub fn builder() -> InterceptorChainBuilder {
        InterceptorChainBuilder::default()
    }

    /// Run `request` through every interceptor and the endpoint.
    pub fn handle(&self, request: Request<Bytes>) -> BoxFuture<'_, Response<Bytes>> {
        Next {
            interceptors: &self.interceptors,
            endpoint: self.endpoint.as_ref(),
        }
        .run(request)
    }
}

/// Builder for [`InterceptorChain`].
#[derive(Debug, Default)]
pub struct InterceptorChainBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChainBuilder {
    /// Append `interceptor`. The first one added is the outermost.
    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Finish the chain with the endpoint producing responses.
    pub fn build<E: Endpoint + 'static>(self, endpoint: E) -> InterceptorChain {
        InterceptorChain {
            interceptors: self.interceptors.into(),
            endpoint: Arc::new(endpoint),
        }
    }
}

/// Access to what [`TracingInterceptor`] stored in a request.
pub trait RequestContextExt {
    /// The context carrying the server span, or an empty context when the
    /// request was not traced.
    fn trace_context(&self) -> Context;

    /// The server span opened for this request.
    fn server_span(&self) -> Option<&SharedSpan>;
}

impl<B> RequestContextExt for Request<B> {
    fn trace_context(&self) -> Context {
        self.extensions().get::<Context>().cloned().unwrap_or_default()
    }

    fn server_span(&self) -> Option<&SharedSpan> {
        self.extensions().get::<SharedSpan>()
    }
}

type RequestFilter = Arc<dyn Fn(&Request<Bytes>) -> bool + Send + Sync>;

/// Opens a `Server` span for every request passing through.
///
/// The span is a child of the `traceparent` the caller sent, or a new trace
/// root when the header is missing or malformed. It is named
/// `"{METHOD} {path}"`, carries `http.request.method` and `url.path`, and
/// once the response is known `http.response.status_code`. 5xx responses set
/// an error status.
///
/// The handler finds the span's [`Context`] and a [`SharedSpan`] handle in
/// the request extensions, see [`RequestContextExt`]. The span ends when the
/// rest of the chain returned.
#[derive(Clone)]
pub struct TracingInterceptor {
    tracer: Tracer,
    propagator: TraceContextPropagator,
    filter: Option<RequestFilter>,
}

impl fmt::Debug for TracingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingInterceptor")
            .field("tracer", &self.tracer)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl TracingInterceptor {
    /// Trace every request with `tracer`.
    pub fn new(tracer: Tracer) -> Self {
        TracingInterceptor {
            tracer,
            propagator: TraceContextPropagator::new(),
            filter: None,
        }
    }

    /// Only trace requests for which `filter` returns `true`. The others go
    /// through the chain without a span or a context.
    ///
    /// ```
    /// # use hivetrace_http::TracingInterceptor;
    /// # use hivetrace_sdk::trace::TracerProvider;
    /// # let tracer = TracerProvider::default().tracer("server");
    /// let interceptor = TracingInterceptor::new(tracer)
    ///     .with_filter(|request| request.uri().path() != "/health");
    /// ```
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl Interceptor for TracingInterceptor {
    fn call<'a>(
        &'a self,
        mut request: Request<Bytes>,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response<Bytes>> {
        if self.filter.as_ref().is_some_and(|filter| !filter(&request)) {
            return next.run(request);
        }

        let parent_cx = self
            .propagator
            .extract(&HeaderExtractor(request.headers()));
        let method = request.method().as_str().to_owned();
        let path = request.uri().path().to_owned();
        let (cx, span) = self
            .tracer
            .span_builder(format!("{method} {path}"))
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new("http.request.method", method),
                KeyValue::new("url.path", path),
            ])
            .start(&self.tracer, &parent_cx);
        let span = SharedSpan::new(span);
        request.extensions_mut().insert(cx);
        request.extensions_mut().insert(span.clone());

        Box::pin(async move {
            let response = next.run(request).await;
            let status = response.status();
            span.set_attribute(KeyValue::new("http.response.status_code", status.as_u16()));
            if status.is_server_error() {
                hive_debug!(
                    name: "TracingInterceptor.ServerError",
                    status = status.as_u16()
                );
                span.set_status(Status::error(status.to_string()));
            }
            span.end();
            response
        })
    }
}
