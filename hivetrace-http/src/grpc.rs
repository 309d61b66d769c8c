//! gRPC integration, built on `tonic`.
//!
//! [`MetadataInjector`] and [`MetadataExtractor`] carry `traceparent` in
//! request metadata. [`GrpcServerInterceptor`] and [`GrpcClientInterceptor`]
//! wrap unary calls in `Server` and `Client` spans.
use crate::RequestContextExt;
use hivetrace::propagation::{Extractor, Injector, TextMapPropagator};
use hivetrace::trace::{SpanKind, Status};
use hivetrace::{hive_debug, Context, KeyValue};
use hivetrace_sdk::propagation::TraceContextPropagator;
use hivetrace_sdk::trace::{SharedSpan, Tracer};
use std::future::Future;
use tonic::metadata::{KeyRef, MetadataKey, MetadataMap, MetadataValue};
use tonic::Code;

/// Writes propagation fields into outgoing gRPC metadata.
///
/// Keys or values that are not valid ASCII metadata are skipped.
#[derive(Debug)]
pub struct MetadataInjector<'a>(pub &'a mut MetadataMap);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(key) = MetadataKey::from_bytes(key.as_bytes()) else {
            return;
        };
        if let Ok(value) = MetadataValue::try_from(&value) {
            self.0.insert(key, value);
        }
    }
}

/// Reads propagation fields from incoming gRPC metadata.
#[derive(Debug)]
pub struct MetadataExtractor<'a>(pub &'a MetadataMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(|key| match key {
                KeyRef::Ascii(key) => key.as_str(),
                KeyRef::Binary(key) => key.as_str(),
            })
            .collect()
    }
}

impl<T> RequestContextExt for tonic::Request<T> {
    fn trace_context(&self) -> Context {
        self.extensions().get::<Context>().cloned().unwrap_or_default()
    }

    fn server_span(&self) -> Option<&SharedSpan> {
        self.extensions().get::<SharedSpan>()
    }
}

/// `rpc.*` attributes for a full method name such as
/// `helloworld.Greeter/SayHello`.
fn rpc_attributes(method: &str) -> Vec<KeyValue> {
    let mut attributes = vec![KeyValue::new("rpc.system", "grpc")];
    if let Some((service, name)) = method.trim_start_matches('/').split_once('/') {
        attributes.push(KeyValue::new("rpc.service", service.to_owned()));
        attributes.push(KeyValue::new("rpc.method", name.to_owned()));
    }
    attributes
}

fn status_code<R>(result: &Result<tonic::Response<R>, tonic::Status>) -> Code {
    match result {
        Ok(_) => Code::Ok,
        Err(status) => status.code(),
    }
}

// Codes that point at the server rather than at the caller.
fn is_server_fault(code: Code) -> bool {
    matches!(
        code,
        Code::Unknown
            | Code::DeadlineExceeded
            | Code::Unimplemented
            | Code::Internal
            | Code::Unavailable
            | Code::DataLoss
    )
}

/// Opens a `Server` span around a unary gRPC handler.
///
/// The span continues the `traceparent` found in the request metadata, is
/// named after the full method and records `rpc.grpc.status_code`. Only
/// codes blaming the server (`Internal`, `Unavailable`, ...) mark it as
/// failed; `InvalidArgument` and the like are the caller's fault.
///
/// The handler reads the span's context through [`RequestContextExt`].
#[derive(Clone, Debug)]
pub struct GrpcServerInterceptor {
    tracer: Tracer,
    propagator: TraceContextPropagator,
}

impl GrpcServerInterceptor {
    /// Trace calls with `tracer`.
    pub fn new(tracer: Tracer) -> Self {
        GrpcServerInterceptor {
            tracer,
            propagator: TraceContextPropagator::new(),
        }
    }

    /// Run `handler` on `request` inside a server span for `method`.
    pub async fn intercept_unary<T, R, F, Fut>(
        &self,
        method: &str,
        mut request: tonic::Request<T>,
        handler: F,
    ) -> Result<tonic::Response<R>, tonic::Status>
    where
        F: FnOnce(tonic::Request<T>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<R>, tonic::Status>>,
    {
        let parent_cx = self
            .propagator
            .extract(&MetadataExtractor(request.metadata()));
        let (cx, span) = self
            .tracer
            .span_builder(method.trim_start_matches('/').to_owned())
            .with_kind(SpanKind::Server)
            .with_attributes(rpc_attributes(method))
            .start(&self.tracer, &parent_cx);
        let span = SharedSpan::new(span);
        request.extensions_mut().insert(cx);
        request.extensions_mut().insert(span.clone());

        let result = handler(request).await;
        let code = status_code(&result);
        span.set_attribute(KeyValue::new("rpc.grpc.status_code", code as i32));
        if let Err(status) = &result {
            if is_server_fault(code) {
                hive_debug!(
                    name: "GrpcServerInterceptor.ServerError",
                    code = code as i32
                );
                span.set_status(Status::error(status.message().to_owned()));
            }
        }
        span.end();
        result
    }
}

/// Opens a `Client` span around an outgoing unary gRPC call and sends the
/// span's identity in the `traceparent` metadata entry.
///
/// Any status other than `Ok` marks the span as failed and is returned as is.
#[derive(Clone, Debug)]
pub struct GrpcClientInterceptor {
    tracer: Tracer,
    propagator: TraceContextPropagator,
}

impl GrpcClientInterceptor {
    /// Trace calls with `tracer`.
    pub fn new(tracer: Tracer) -> Self {
        GrpcClientInterceptor {
            tracer,
            propagator: TraceContextPropagator::new(),
        }
    }

    /// Send `request` through `call` on behalf of the work carried by `cx`.
    pub async fn intercept_unary<T, R, F, Fut>(
        &self,
        cx: &Context,
        method: &str,
        mut request: tonic::Request<T>,
        call: F,
    ) -> Result<tonic::Response<R>, tonic::Status>
    where
        F: FnOnce(tonic::Request<T>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<R>, tonic::Status>>,
    {
        let (span_cx, mut span) = self
            .tracer
            .span_builder(method.trim_start_matches('/').to_owned())
            .with_kind(SpanKind::Client)
            .with_attributes(rpc_attributes(method))
            .start(&self.tracer, cx);
        self.propagator
            .inject_context(&span_cx, &mut MetadataInjector(request.metadata_mut()));

        let result = call(request).await;
        let code = status_code(&result);
        span.set_attribute(KeyValue::new("rpc.grpc.status_code", code as i32));
        if let Err(status) = &result {
            hive_debug!(
                name: "GrpcClientInterceptor.CallFailed",
                code = code as i32,
                message = status.message().to_owned()
            );
            span.set_status(Status::error(status.message().to_owned()));
        }
        span.end();
        result
    }
}
