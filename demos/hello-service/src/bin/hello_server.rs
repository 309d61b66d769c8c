use hello_service::primary::{self, Upstreams, DEFAULT_EXTERNAL_URL, DEFAULT_TIMED_OPERATION_PERIOD};
use hello_service::server::{self, env_or, BoxError};
use hivetrace_http::TracedClient;
use hivetrace_sdk::trace::InstrumentationScope;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    server::init_logging();
    let provider = server::init_tracer_provider("hello-server");
    let tracer = provider.tracer_with_scope(
        InstrumentationScope::new("hello-service/hello-server")
            .with_version(server::SERVICE_VERSION),
    );

    let external_url = env_or("EXTERNAL_URL", DEFAULT_EXTERNAL_URL);
    let upstreams = Upstreams {
        external_url: external_url.clone(),
        secondary_hello_url: format!(
            "http://{}/hello",
            env_or("SECONDARY_HOST", "localhost:8082")
        ),
        greeter_url: format!("http://{}:7070", env_or("GRPC_TARGET", "localhost")),
    };
    let client = TracedClient::new(reqwest::Client::new(), tracer.clone());
    let interval = env_or("TIMED_OPERATION_INTERVAL_SECS", "60");
    let period = match interval.parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(value = %interval, "invalid TIMED_OPERATION_INTERVAL_SECS, using 60");
            DEFAULT_TIMED_OPERATION_PERIOD
        }
    };
    let (stop_ticker, ticker) =
        primary::spawn_timed_operation(tracer.clone(), client.clone(), external_url, period);

    let address = format!("{}:{}", env_or("HOST", "localhost"), env_or("PORT", "8080"));
    let served = server::serve(
        &address,
        primary::router(tracer, client, upstreams),
        server::ctrl_c(),
    )
    .await;

    let _ = stop_ticker.send(());
    if let Err(err) = ticker.await {
        error!(error = %err, "timed operation panicked");
    }
    if let Err(err) = provider.shutdown() {
        error!(error = %err, "tracer provider shutdown failed");
    }
    info!("bye");
    served
}
