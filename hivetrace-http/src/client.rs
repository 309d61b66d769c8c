use crate::{Bytes, HeaderInjector, HttpClient, HttpError, Request, Response, ResponseExt};
use hivetrace::propagation::TextMapPropagator;
use hivetrace::trace::{SpanKind, Status};
use hivetrace::{hive_debug, Context, KeyValue};
use hivetrace_sdk::propagation::TraceContextPropagator;
use hivetrace_sdk::trace::Tracer;

/// An [`HttpClient`] wrapper recording a `Client` span for every call.
///
/// The span is a child of the context passed to [`send`](TracedClient::send),
/// and its identity travels to the server in the `traceparent` header. Calls
/// fail fast: a transport error or a response outside 2xx is returned as an
/// [`HttpError`] with the span marked as failed, never retried.
#[derive(Clone, Debug)]
pub struct TracedClient<C> {
    inner: C,
    tracer: Tracer,
    propagator: TraceContextPropagator,
}

impl<C: HttpClient> TracedClient<C> {
    /// Wrap `inner`, recording spans with `tracer`.
    pub fn new(inner: C, tracer: Tracer) -> Self {
        TracedClient {
            inner,
            tracer,
            propagator: TraceContextPropagator::new(),
        }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Send `request` on behalf of the work carried by `cx`.
    pub async fn send(
        &self,
        cx: &Context,
        mut request: Request<Bytes>,
    ) -> Result<Response<Bytes>, HttpError> {
        let method = request.method().as_str().to_owned();
        let mut attributes = vec![
            KeyValue::new("http.request.method", method.clone()),
            KeyValue::new("url.full", request.uri().to_string()),
        ];
        if let Some(host) = request.uri().host() {
            attributes.push(KeyValue::new("server.address", host.to_owned()));
        }
        let (span_cx, mut span) = self
            .tracer
            .span_builder(format!("HTTP {method}"))
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start(&self.tracer, cx);
        self.propagator
            .inject_context(&span_cx, &mut HeaderInjector(request.headers_mut()));

        let result = match self.inner.send_bytes(request).await {
            Ok(response) => {
                span.set_attribute(KeyValue::new(
                    "http.response.status_code",
                    response.status().as_u16(),
                ));
                response.error_for_status()
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            hive_debug!(
                name: "TracedClient.RequestFailed",
                error = err.to_string()
            );
            span.set_status(Status::error(err.to_string()));
        }
        span.end();
        result
    }

    /// `GET url` with an empty body.
    pub async fn get(&self, cx: &Context, url: &str) -> Result<Response<Bytes>, HttpError> {
        let request = Request::get(url).body(Bytes::new())?;
        self.send(cx, request).await
    }
}
