//! Routes of `secondary-server`.
use crate::server::text;
use hivetrace::KeyValue;
use hivetrace_http::{
    Bytes, InterceptorChain, Request, RequestContextExt, Response, TracingInterceptor,
};
use hivetrace_sdk::trace::Tracer;
use hyper::{Method, StatusCode};
use std::time::Duration;

/// The request handler of `secondary-server`.
pub fn router(tracer: Tracer) -> InterceptorChain {
    let handler_tracer = tracer.clone();
    InterceptorChain::builder()
        .with(
            TracingInterceptor::new(tracer)
                .with_filter(|request| request.uri().path() != "/health"),
        )
        .build(move |request: Request<Bytes>| {
            let tracer = handler_tracer.clone();
            async move { route(&tracer, request).await }
        })
}

async fn route(tracer: &Tracer, request: Request<Bytes>) -> Response<Bytes> {
    match (request.method(), request.uri().path()) {
        (&Method::GET, "/health") => text(StatusCode::OK, "ok"),
        (&Method::GET, "/hello") => hello(tracer, request).await,
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn hello(tracer: &Tracer, request: Request<Bytes>) -> Response<Bytes> {
    if let Some(span) = request.server_span() {
        span.set_attributes([
            KeyValue::new("isTrue", true),
            KeyValue::new("stringAttr", "Ciao"),
        ]);
    }

    let (_, mut child) = tracer.start(&request.trace_context(), "custom-span-secondary");
    tokio::time::sleep(Duration::from_millis(10)).await;
    child.end();

    text(StatusCode::OK, "Hello, World from secondary!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivetrace::propagation::Injector;
    use hivetrace_http::HeaderInjector;
    use hivetrace_sdk::trace::{InMemorySpanExporter, TracerProvider};

    #[tokio::test]
    async fn hello_joins_the_callers_trace() {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let chain = router(provider.tracer("secondary-server"));

        let mut request = Request::get("/hello").body(Bytes::new()).unwrap();
        HeaderInjector(request.headers_mut()).set(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
        );
        let response = chain.handle(request).await;
        assert_eq!(
            response.body(),
            &Bytes::from_static(b"Hello, World from secondary!")
        );

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        let (child, server) = (&spans[0], &spans[1]);
        assert_eq!(child.name, "custom-span-secondary");
        assert_eq!(child.parent_span_id, server.span_context.span_id());
        assert_eq!(
            server.span_context.trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(server.parent_span_id.to_string(), "00f067aa0ba902b7");
    }

    #[tokio::test]
    async fn health_is_not_traced() {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let chain = router(provider.tracer("secondary-server"));

        let response = chain
            .handle(Request::get("/health").body(Bytes::new()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }
}
