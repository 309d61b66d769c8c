use hello_service::secondary;
use hello_service::server::{self, env_or, BoxError};
use hivetrace_sdk::trace::InstrumentationScope;
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    server::init_logging();
    let provider = server::init_tracer_provider("secondary-server");
    let tracer = provider.tracer_with_scope(
        InstrumentationScope::new("hello-service/secondary-server")
            .with_version(server::SERVICE_VERSION),
    );

    let address = format!("{}:{}", env_or("HOST", "localhost"), env_or("PORT", "8082"));
    let served = server::serve(&address, secondary::router(tracer), server::ctrl_c()).await;

    if let Err(err) = provider.shutdown() {
        error!(error = %err, "tracer provider shutdown failed");
    }
    served
}
