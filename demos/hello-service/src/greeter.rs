//! The `Greeter` gRPC service of `grpc-server`, and the traced call made by
//! `hello-server`.
use crate::helloworld::greeter_client::GreeterClient;
use crate::helloworld::greeter_server::{Greeter, GreeterServer};
use crate::helloworld::{HelloRequest, HelloResponse};
use crate::server::BoxError;
use async_trait::async_trait;
use hivetrace::Context;
use hivetrace_http::{GrpcClientInterceptor, GrpcServerInterceptor};
use hivetrace_sdk::trace::Tracer;
use std::future::Future;
use tokio::net::TcpListener;
use tonic::transport::server::TcpIncoming;
use tonic::transport::{Endpoint, Server};
use tonic::{Request, Response, Status};
use tracing::info;

/// Full name of the only method.
pub const SAY_HELLO: &str = "/helloworld.Greeter/SayHello";

/// Replies `Hello {greeting}`; an empty greeting is rejected.
#[derive(Debug)]
pub struct HelloGreeter {
    interceptor: GrpcServerInterceptor,
}

impl HelloGreeter {
    /// A greeter recording its server spans with `tracer`.
    pub fn new(tracer: Tracer) -> Self {
        HelloGreeter {
            interceptor: GrpcServerInterceptor::new(tracer),
        }
    }
}

#[async_trait]
impl Greeter for HelloGreeter {
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloResponse>, Status> {
        self.interceptor
            .intercept_unary(SAY_HELLO, request, |request| async move {
                let greeting = request.into_inner().greeting;
                if greeting.is_empty() {
                    return Err(Status::invalid_argument(
                        "request missing required field: Greeting",
                    ));
                }
                Ok(Response::new(HelloResponse {
                    reply: format!("Hello {greeting}"),
                }))
            })
            .await
    }
}

/// Serve `greeter` on `address` until `shutdown` resolves.
pub async fn serve(
    address: &str,
    greeter: HelloGreeter,
    shutdown: impl Future<Output = ()>,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(address).await?;
    serve_listener(listener, greeter, shutdown).await
}

/// Like [`serve`], on a socket that is already bound.
pub async fn serve_listener(
    listener: TcpListener,
    greeter: HelloGreeter,
    shutdown: impl Future<Output = ()>,
) -> Result<(), BoxError> {
    info!(address = %listener.local_addr()?, "listening for gRPC");
    Server::builder()
        .add_service(GreeterServer::new(greeter))
        .serve_with_incoming_shutdown(TcpIncoming::from(listener), shutdown)
        .await?;
    info!("gRPC server stopped");
    Ok(())
}

/// Calls `SayHello` on the greeter at `url` within a `Client` span.
///
/// A new connection is made per call. Connection failures come back as
/// `Unavailable`, like any other failed call.
pub async fn say_hello(
    interceptor: &GrpcClientInterceptor,
    cx: &Context,
    url: &str,
    greeting: &str,
) -> Result<String, Status> {
    let request = Request::new(HelloRequest {
        greeting: greeting.to_owned(),
    });
    let response = interceptor
        .intercept_unary(cx, SAY_HELLO, request, |request| async move {
            let channel = Endpoint::from_shared(url.to_owned())
                .map_err(|err| Status::invalid_argument(err.to_string()))?
                .connect()
                .await
                .map_err(|err| Status::unavailable(err.to_string()))?;
            GreeterClient::new(channel).say_hello(request).await
        })
        .await?;
    Ok(response.into_inner().reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivetrace::trace::{SpanKind, Status as SpanStatus};
    use hivetrace_sdk::trace::{InMemorySpanExporter, TracerProvider};
    use tonic::metadata::MetadataValue;
    use tonic::Code;

    fn provider() -> (TracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    #[tokio::test]
    async fn say_hello_continues_the_callers_trace() {
        let (provider, exporter) = provider();
        let greeter = HelloGreeter::new(provider.tracer("grpc-server"));

        let mut request = Request::new(HelloRequest {
            greeting: "ciao".to_string(),
        });
        request.metadata_mut().insert(
            "traceparent",
            MetadataValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        let reply = greeter.say_hello(request).await.unwrap();
        assert_eq!(reply.into_inner().reply, "Hello ciao");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_kind, SpanKind::Server);
        assert_eq!(spans[0].parent_span_id.to_string(), "00f067aa0ba902b7");
    }

    #[tokio::test]
    async fn empty_greeting_is_the_callers_fault() {
        let (provider, exporter) = provider();
        let greeter = HelloGreeter::new(provider.tracer("grpc-server"));

        let status = greeter
            .say_hello(Request::new(HelloRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].status, SpanStatus::Unset);
    }

    #[tokio::test]
    async fn unreachable_greeter_fails_the_client_span() {
        let (provider, exporter) = provider();
        let interceptor = GrpcClientInterceptor::new(provider.tracer("hello-server"));

        let status = say_hello(&interceptor, &Context::new(), "http://127.0.0.1:1", "ciao")
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_kind, SpanKind::Client);
        assert!(matches!(spans[0].status, SpanStatus::Error { .. }));
    }
}
