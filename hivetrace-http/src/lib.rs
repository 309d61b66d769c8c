//! HTTP and gRPC integration for hivetrace.
//!
//! Inbound, an [`InterceptorChain`] with a [`TracingInterceptor`] extracts
//! the caller's `traceparent`, opens the server span and passes both to the
//! handler through the request extensions. Outbound, a [`TracedClient`] opens
//! a client span per call and injects the context into the request headers.
//!
//! ```
//! use hivetrace_http::{Bytes, InterceptorChain, Request, RequestContextExt, Response, TracingInterceptor};
//! use hivetrace_sdk::trace::TracerProvider;
//!
//! # async fn demo() {
//! let provider = TracerProvider::default();
//! let chain = InterceptorChain::builder()
//!     .with(TracingInterceptor::new(provider.tracer("server")))
//!     .build(|request: Request<Bytes>| async move {
//!         let cx = request.trace_context();
//!         // start child spans from `cx`...
//!         # let _ = cx;
//!         Response::new(Bytes::from_static(b"Hello, World!"))
//!     });
//!
//! let response = chain.handle(Request::new(Bytes::new())).await;
//! assert!(response.status().is_success());
//! # }
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use async_trait::async_trait;
use hivetrace::propagation::{Extractor, Injector};
use std::fmt::Debug;

#[doc(no_inline)]
pub use bytes::Bytes;
#[doc(no_inline)]
pub use http::{Request, Response};

mod client;
#[cfg(feature = "grpc")]
mod grpc;
mod interceptor;

pub use client::TracedClient;
#[cfg(feature = "grpc")]
pub use grpc::{
    GrpcClientInterceptor, GrpcServerInterceptor, MetadataExtractor, MetadataInjector,
};
pub use interceptor::{
    Endpoint, Interceptor, InterceptorChain, InterceptorChainBuilder, Next, RequestContextExt,
    TracingInterceptor,
};

/// Writes propagation fields into outgoing HTTP headers.
///
/// Keys or values that are not valid header text are skipped.
#[derive(Debug)]
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(name) = http::header::HeaderName::from_bytes(key.as_bytes()) else {
            return;
        };
        if let Ok(value) = http::header::HeaderValue::from_str(&value) {
            self.0.insert(name, value);
        }
    }
}

/// Reads propagation fields from incoming HTTP headers.
///
/// Header names are case insensitive; values that are not visible ASCII read
/// as absent.
#[derive(Debug)]
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Error type of every outbound call.
pub type HttpError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The transport a [`TracedClient`] sends requests through.
///
/// Implementations only report transport failures (connection refused,
/// timeout, broken body). Any status code, including 4xx and 5xx, is a
/// successful exchange at this level; see [`ResponseExt::error_for_status`].
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    /// Send `request` and return the full response.
    async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError>;
}

#[cfg(feature = "reqwest")]
mod reqwest {
    use super::{async_trait, Bytes, HttpClient, HttpError, Request, Response};
    use hivetrace::hive_debug;

    #[async_trait]
    impl HttpClient for reqwest::Client {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            hive_debug!(name: "ReqwestClient.Send");
            let request = request.try_into()?;
            let mut response = self.execute(request).await?;
            let headers = std::mem::take(response.headers_mut());
            let mut http_response = Response::builder()
                .status(response.status())
                .body(response.bytes().await?)?;
            *http_response.headers_mut() = headers;

            Ok(http_response)
        }
    }
}

/// Helpers for responses returned by an [`HttpClient`].
pub trait ResponseExt: Sized {
    /// Turn the response into an error unless its status is 2xx.
    fn error_for_status(self) -> Result<Self, HttpError>;
}

impl<T> ResponseExt for Response<T> {
    fn error_for_status(self) -> Result<Self, HttpError> {
        if self.status().is_success() {
            Ok(self)
        } else {
            Err(format!("request failed with status {}", self.status()).into())
        }
    }
}
