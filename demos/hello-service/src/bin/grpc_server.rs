use hello_service::greeter::{self, HelloGreeter};
use hello_service::server::{self, env_or, BoxError};
use hivetrace_sdk::trace::InstrumentationScope;
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    server::init_logging();
    let provider = server::init_tracer_provider("grpc-server");
    let tracer = provider.tracer_with_scope(
        InstrumentationScope::new("hello-service/grpc-server")
            .with_version(server::SERVICE_VERSION),
    );

    let address = format!("{}:{}", env_or("HOST", "0.0.0.0"), env_or("PORT", "7070"));
    let served = greeter::serve(&address, HelloGreeter::new(tracer), server::ctrl_c()).await;

    if let Err(err) = provider.shutdown() {
        error!(error = %err, "tracer provider shutdown failed");
    }
    served
}
