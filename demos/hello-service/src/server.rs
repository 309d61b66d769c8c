//! Setup shared by both services.
use hivetrace_http::{Bytes, InterceptorChain, Request, Response};
use hivetrace_sdk::trace::TracerProvider;
use hivetrace_sdk::Resource;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::error::Error;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Error type of the binaries' setup code.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Service version reported in `service.version`.
pub const SERVICE_VERSION: &str = "0.0.1";

/// Value of the environment variable `key`, or `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Log to stderr, filtered by `RUST_LOG` and `info` by default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A provider batching spans to the stdout exporter.
pub fn init_tracer_provider(service_name: &'static str) -> TracerProvider {
    TracerProvider::builder()
        .with_batch_exporter(hivetrace_stdout::SpanExporter::default())
        .with_resource(
            Resource::builder()
                .with_service_name(service_name)
                .with_service_version(SERVICE_VERSION)
                .build(),
        )
        .build()
}

/// A plain text response.
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Bytes> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

/// Serve `chain` on `address` until `shutdown` resolves.
///
/// Connections already accepted keep running on their own tasks.
pub async fn serve(
    address: &str,
    chain: InterceptorChain,
    shutdown: impl Future<Output = ()>,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(address).await?;
    info!(address, "listening");
    tokio::pin!(shutdown);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                info!("shutting down");
                return Ok(());
            }
        };

        let chain = chain.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request: Request<Incoming>| {
                let chain = chain.clone();
                async move { Ok::<_, Infallible>(dispatch(&chain, request).await) }
            });
            if let Err(err) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                warn!(error = %err, "connection failed");
            }
        });
    }
}

async fn dispatch(chain: &InterceptorChain, request: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    let response = match body.collect().await {
        Ok(collected) => {
            chain
                .handle(Request::from_parts(parts, collected.to_bytes()))
                .await
        }
        Err(err) => text(StatusCode::BAD_REQUEST, err.to_string()),
    };
    response.map(Full::new)
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
