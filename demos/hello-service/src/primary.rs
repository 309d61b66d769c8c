//! Routes and background work of `hello-server`.
use crate::greeter;
use crate::server::text;
use hivetrace::{Context, KeyValue};
use hivetrace_http::{
    Bytes, GrpcClientInterceptor, HttpClient, InterceptorChain, Request, RequestContextExt,
    Response, TracedClient, TracingInterceptor,
};
use hivetrace_sdk::trace::Tracer;
use hyper::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default target of outbound calls.
pub const DEFAULT_EXTERNAL_URL: &str = "https://pokeapi.co/api/v2/pokemon/ditto";
/// Default period of the timed operation.
pub const DEFAULT_TIMED_OPERATION_PERIOD: Duration = Duration::from_secs(60);

/// Where `hello-server` sends its outbound calls.
#[derive(Clone, Debug)]
pub struct Upstreams {
    /// Called by `/hello-chain` and by the timed operation.
    pub external_url: String,
    /// `/hello` of the secondary service.
    pub secondary_hello_url: String,
    /// The `Greeter` gRPC service, called by `/hello-grpc`.
    pub greeter_url: String,
}

#[derive(Debug)]
struct HelloApp<C> {
    tracer: Tracer,
    client: TracedClient<C>,
    grpc: GrpcClientInterceptor,
    upstreams: Upstreams,
}

/// The request handler of `hello-server`: tracing first, then routing.
///
/// `/health` is answered without a span.
pub fn router<C>(tracer: Tracer, client: TracedClient<C>, upstreams: Upstreams) -> InterceptorChain
where
    C: HttpClient + 'static,
{
    let app = Arc::new(HelloApp {
        tracer: tracer.clone(),
        client,
        grpc: GrpcClientInterceptor::new(tracer.clone()),
        upstreams,
    });
    InterceptorChain::builder()
        .with(
            TracingInterceptor::new(tracer)
                .with_filter(|request| request.uri().path() != "/health"),
        )
        .build(move |request: Request<Bytes>| {
            let app = app.clone();
            async move { app.route(request).await }
        })
}

impl<C: HttpClient> HelloApp<C> {
    async fn route(&self, request: Request<Bytes>) -> Response<Bytes> {
        match (request.method(), request.uri().path()) {
            (&Method::GET, "/health") => text(StatusCode::OK, "ok"),
            (&Method::GET, "/hello") => self.hello(request).await,
            (&Method::GET, "/hello-chain") => self.hello_chain(request).await,
            (&Method::GET, "/hello-grpc") => self.hello_grpc(request).await,
            _ => text(StatusCode::NOT_FOUND, "not found"),
        }
    }

    async fn hello(&self, request: Request<Bytes>) -> Response<Bytes> {
        if let Some(span) = request.server_span() {
            span.set_attributes([
                KeyValue::new("isTrue", true),
                KeyValue::new("stringAttr", "Ciao"),
            ]);
        }

        let (cx, mut child) = self.tracer.start(&request.trace_context(), "custom-span");
        tokio::time::sleep(Duration::from_millis(10)).await;
        example_child_span(&self.tracer, &cx).await;
        child.end();

        if let Some(span) = request.server_span() {
            span.add_event("Done Activity", vec![]);
        }
        text(StatusCode::OK, "Hello, World!")
    }

    async fn hello_chain(&self, request: Request<Bytes>) -> Response<Bytes> {
        let cx = request.trace_context();

        let (_, mut work) = self.tracer.start(&cx, "fake-long-running-task");
        tokio::time::sleep(Duration::from_millis(20)).await;
        work.add_event("Done first fake long running task", vec![]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        work.add_event("Done second fake long running task", vec![]);
        work.end();

        for url in [
            &self.upstreams.external_url,
            &self.upstreams.secondary_hello_url,
        ] {
            if let Err(err) = self.client.get(&cx, url).await {
                warn!(url = %url, error = %err, "outbound call failed");
                return text(StatusCode::BAD_GATEWAY, format!("{url}: {err}"));
            }
        }

        let (_, mut post) = self.tracer.start(&cx, "post-processing");
        post.add_event("Start post processing", vec![]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        post.end();

        text(StatusCode::OK, "Hello, World!")
    }

    async fn hello_grpc(&self, request: Request<Bytes>) -> Response<Bytes> {
        let cx = request.trace_context();
        let url = &self.upstreams.greeter_url;
        match greeter::say_hello(&self.grpc, &cx, url, "ciao").await {
            Ok(reply) => {
                info!(reply = %reply, "greeting received");
                text(StatusCode::OK, reply)
            }
            Err(status) => {
                warn!(url = %url, code = ?status.code(), "gRPC call failed");
                text(StatusCode::BAD_GATEWAY, format!("{url}: {}", status.message()))
            }
        }
    }
}

async fn example_child_span(tracer: &Tracer, cx: &Context) {
    let (_, mut span) = tracer.start(cx, "operation-name");
    span.add_event("ciao", vec![]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    span.end();
}

/// A periodic job producing a new trace root every `period`.
///
/// Dropping or sending on the returned stop handle ends the loop; the task
/// finishes the operation in flight first. A zero `period` falls back to
/// [`DEFAULT_TIMED_OPERATION_PERIOD`].
pub fn spawn_timed_operation<C>(
    tracer: Tracer,
    client: TracedClient<C>,
    url: String,
    period: Duration,
) -> (oneshot::Sender<()>, JoinHandle<()>)
where
    C: HttpClient + 'static,
{
    let period = if period.is_zero() {
        warn!(
            fallback_secs = DEFAULT_TIMED_OPERATION_PERIOD.as_secs(),
            "timed operation period must be positive"
        );
        DEFAULT_TIMED_OPERATION_PERIOD
    } else {
        period
    };
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (cx, mut span) = tracer.start(&Context::new(), "timed-operation");
                    if let Err(err) = client.get(&cx, &url).await {
                        warn!(error = %err, "timed operation failed");
                    }
                    span.end();
                }
                _ = &mut stop_rx => break,
            }
        }
        info!("timed operation stopped");
    });
    (stop_tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hivetrace::trace::{SpanKind, Status};
    use hivetrace::Value;
    use hivetrace_http::HttpError;
    use hivetrace_sdk::testing::trace::find_span_anomalies;
    use hivetrace_sdk::trace::{InMemorySpanExporter, SpanData, TracerProvider};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct StubClient {
        failing_url: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            let url = request.uri().to_string();
            self.calls.lock().unwrap().push(url.clone());
            if self.failing_url.as_deref() == Some(url.as_str()) {
                return Err("connection refused".into());
            }
            Ok(Response::new(Bytes::from_static(b"{}")))
        }
    }

    fn upstreams() -> Upstreams {
        Upstreams {
            external_url: "http://external.test/ditto".to_string(),
            secondary_hello_url: "http://secondary.test:8082/hello".to_string(),
            greeter_url: "http://127.0.0.1:1".to_string(),
        }
    }

    fn setup(client: StubClient) -> (InterceptorChain, InMemorySpanExporter) {
        let (chain, exporter, _) = setup_with(client, upstreams());
        (chain, exporter)
    }

    fn setup_with(
        client: StubClient,
        upstreams: Upstreams,
    ) -> (InterceptorChain, InMemorySpanExporter, TracerProvider) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("hello-server");
        let chain = router(tracer.clone(), TracedClient::new(client, tracer), upstreams);
        (chain, exporter, provider)
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::get(path).body(Bytes::new()).unwrap()
    }

    fn by_name<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
        spans.iter().find(|span| span.name == name).unwrap()
    }

    #[tokio::test]
    async fn health_is_not_traced() {
        let (chain, exporter) = setup(StubClient::default());

        let response = chain.handle(get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hello_builds_a_span_tree() {
        let (chain, exporter) = setup(StubClient::default());

        let response = chain.handle(get("/hello")).await;
        assert_eq!(response.body(), &Bytes::from_static(b"Hello, World!"));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 3);
        assert!(find_span_anomalies(&spans).is_empty());

        let server = by_name(&spans, "GET /hello");
        let custom = by_name(&spans, "custom-span");
        let operation = by_name(&spans, "operation-name");
        assert_eq!(server.span_kind, SpanKind::Server);
        assert_eq!(custom.parent_span_id, server.span_context.span_id());
        assert_eq!(operation.parent_span_id, custom.span_context.span_id());
        assert_eq!(operation.events[0].name, "ciao");
        assert_eq!(server.events[0].name, "Done Activity");
        assert!(server
            .attributes
            .contains(&KeyValue::new("stringAttr", "Ciao")));
        assert!(server
            .attributes
            .contains(&KeyValue::new("isTrue", Value::Bool(true))));
    }

    #[tokio::test]
    async fn hello_chain_calls_both_upstreams() {
        let (chain, exporter) = setup(StubClient::default());

        let response = chain.handle(get("/hello-chain")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let spans = exporter.get_finished_spans().unwrap();
        let server = by_name(&spans, "GET /hello-chain");
        let clients: Vec<_> = spans
            .iter()
            .filter(|span| span.span_kind == SpanKind::Client)
            .collect();
        assert_eq!(clients.len(), 2);
        assert!(clients
            .iter()
            .all(|span| span.parent_span_id == server.span_context.span_id()));

        let work = by_name(&spans, "fake-long-running-task");
        let events: Vec<_> = work.events.iter().map(|e| e.name.as_ref()).collect();
        assert_eq!(
            events,
            vec![
                "Done first fake long running task",
                "Done second fake long running task"
            ]
        );
        assert_eq!(
            by_name(&spans, "post-processing").events[0].name,
            "Start post processing"
        );
        assert!(find_span_anomalies(&spans).is_empty());
    }

    #[tokio::test]
    async fn hello_chain_fails_fast_on_upstream_error() {
        let client = StubClient {
            failing_url: Some(upstreams().external_url),
            ..StubClient::default()
        };
        let (chain, exporter) = setup(client);

        let response = chain.handle(get("/hello-chain")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let spans = exporter.get_finished_spans().unwrap();
        assert!(spans.iter().all(|span| span.name != "post-processing"));
        let server = by_name(&spans, "GET /hello-chain");
        assert_eq!(server.status, Status::error("502 Bad Gateway"));
        let clients = spans
            .iter()
            .filter(|span| span.span_kind == SpanKind::Client)
            .count();
        assert_eq!(clients, 1, "secondary must not be called");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (chain, _) = setup(StubClient::default());
        assert_eq!(
            chain.handle(get("/nope")).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn timed_operation_starts_new_traces_and_stops() {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("hello-server");
        let (stop, handle) = spawn_timed_operation(
            tracer.clone(),
            TracedClient::new(StubClient::default(), tracer),
            upstreams().external_url,
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        let roots: Vec<_> = spans
            .iter()
            .filter(|span| span.name == "timed-operation")
            .collect();
        assert!(!roots.is_empty());
        assert!(roots.iter().all(|span| span.is_root()));

        let stopped_at = spans.len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(exporter.get_finished_spans().unwrap().len(), stopped_at);
    }

    #[tokio::test]
    async fn zero_period_falls_back_to_the_default() {
        let provider = TracerProvider::builder()
            .with_simple_exporter(InMemorySpanExporter::default())
            .build();
        let tracer = provider.tracer("hello-server");
        let (stop, handle) = spawn_timed_operation(
            tracer.clone(),
            TracedClient::new(StubClient::default(), tracer),
            upstreams().external_url,
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn hello_grpc_fails_fast_when_the_greeter_is_down() {
        let (chain, exporter) = setup(StubClient::default());

        let response = chain.handle(get("/hello-grpc")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let spans = exporter.get_finished_spans().unwrap();
        let client = spans
            .iter()
            .find(|span| span.span_kind == SpanKind::Client)
            .unwrap();
        assert_eq!(client.name, "helloworld.Greeter/SayHello");
        assert!(matches!(client.status, Status::Error { .. }));
        assert_eq!(
            by_name(&spans, "GET /hello-grpc").status,
            Status::error("502 Bad Gateway")
        );
    }

    #[tokio::test]
    async fn hello_grpc_joins_the_greeters_trace() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let upstreams = Upstreams {
            greeter_url: format!("http://{address}"),
            ..upstreams()
        };
        let (chain, exporter, provider) = setup_with(StubClient::default(), upstreams);

        let (stop, stopped) = oneshot::channel::<()>();
        let greeter = tokio::spawn(greeter::serve_listener(
            listener,
            greeter::HelloGreeter::new(provider.tracer("grpc-server")),
            async {
                let _ = stopped.await;
            },
        ));

        let response = chain.handle(get("/hello-grpc")).await;
        assert_eq!(response.body(), &Bytes::from_static(b"Hello ciao"));
        stop.send(()).unwrap();
        greeter.await.unwrap().unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        let server = by_name(&spans, "GET /hello-grpc");
        let client = spans
            .iter()
            .find(|span| span.span_kind == SpanKind::Client)
            .unwrap();
        let greeter_span = spans
            .iter()
            .find(|span| span.span_kind == SpanKind::Server && span.name == client.name)
            .unwrap();
        assert_eq!(client.parent_span_id, server.span_context.span_id());
        assert_eq!(greeter_span.parent_span_id, client.span_context.span_id());
        assert!(find_span_anomalies(&spans).is_empty());
    }
}
