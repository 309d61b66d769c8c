//! Small services traced end to end with hivetrace.
//!
//! `hello-server` answers `/hello` and `/hello-chain`; the latter calls an
//! external URL and `secondary-server`, so one request produces a trace
//! spanning both processes. `/hello-grpc` does the same over gRPC with
//! `grpc-server`. Spans are printed to stdout.
pub mod greeter;
pub mod primary;
pub mod secondary;
pub mod server;

/// Messages and stubs of the `helloworld` package.
#[allow(clippy::derive_partial_eq_without_eq)]
pub mod helloworld {
    include!("proto/helloworld.rs");
}
