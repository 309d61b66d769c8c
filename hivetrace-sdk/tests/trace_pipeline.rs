use hivetrace::propagation::TextMapPropagator;
use hivetrace::trace::{SpanKind, Status, TraceContextExt, TraceId};
use hivetrace::{Context, KeyValue};
use hivetrace_sdk::propagation::TraceContextPropagator;
use hivetrace_sdk::testing::trace::{find_span_anomalies, SpanAnomaly};
use hivetrace_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, InMemorySpanExporter, Sampler, TracerProvider,
};
use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

fn batch_provider(exporter: &InMemorySpanExporter) -> TracerProvider {
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_max_queue_size(1_000)
                .with_max_export_batch_size(100)
                .with_scheduled_delay(Duration::from_secs(3600))
                .build(),
        )
        .build();
    TracerProvider::builder()
        .with_span_processor(processor)
        .with_sampler(Sampler::AlwaysOn)
        .build()
}

#[test]
fn nested_spans_are_exported_as_one_trace() {
    let exporter = InMemorySpanExporter::default();
    let provider = batch_provider(&exporter);
    let tracer = provider.tracer("scenario");

    let (cx_a, mut a) = tracer.start(&Context::new(), "A");
    let (_, mut b) = tracer.start(&cx_a, "B");
    b.end();
    a.end();
    provider.shutdown().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 2);
    let a = spans.iter().find(|s| s.name == "A").unwrap();
    let b = spans.iter().find(|s| s.name == "B").unwrap();
    assert_eq!(a.span_context.trace_id(), b.span_context.trace_id());
    assert_eq!(b.parent_span_id, a.span_context.span_id());
    assert!(a.is_root());
    assert!(find_span_anomalies(&spans).is_empty());
}

#[test]
fn child_outliving_parent_is_detected() {
    let exporter = InMemorySpanExporter::default();
    let provider = batch_provider(&exporter);
    let tracer = provider.tracer("scenario");

    let (cx, mut parent) = tracer.start(&Context::new(), "parent");
    let (_, mut child) = tracer.start(&cx, "leaked-child");
    parent.end();
    thread::sleep(Duration::from_millis(5));
    child.end();
    provider.force_flush().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    let anomalies = find_span_anomalies(&spans);
    assert_eq!(
        anomalies,
        vec![SpanAnomaly::ChildOutlivesParent {
            parent: parent.span_context().span_id(),
            child: child.span_context().span_id(),
        }]
    );
}

#[test]
fn context_crosses_threads_and_processes() {
    let exporter = InMemorySpanExporter::default();
    let provider = batch_provider(&exporter);
    let tracer = provider.tracer("client");
    let propagator = TraceContextPropagator::new();

    let (cx, mut client) = tracer
        .span_builder("GET /hello")
        .with_kind(SpanKind::Client)
        .start(&tracer, &Context::new());
    let mut headers = HashMap::new();
    propagator.inject_context(&cx, &mut headers);

    // the "server" runs on another thread with its own view of the headers
    let server_tracer = provider.tracer("server");
    let server_trace_id = thread::spawn(move || {
        let parent_cx = TraceContextPropagator::new().extract(&headers);
        let (cx, mut span) = server_tracer
            .span_builder("GET /hello")
            .with_kind(SpanKind::Server)
            .start(&server_tracer, &parent_cx);
        span.set_attribute(KeyValue::new("http.response.status_code", 200));
        span.end();
        cx.span_context().trace_id()
    })
    .join()
    .unwrap();

    client.end();
    provider.shutdown().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    let server = spans.iter().find(|s| s.span_kind == SpanKind::Server).unwrap();
    let client = spans.iter().find(|s| s.span_kind == SpanKind::Client).unwrap();
    assert_eq!(server_trace_id, client.span_context.trace_id());
    assert_eq!(server.parent_span_id, client.span_context.span_id());
}

#[test]
fn concurrent_requests_keep_their_own_traces() {
    let exporter = InMemorySpanExporter::default();
    let provider = batch_provider(&exporter);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let tracer = provider.tracer("worker");
            thread::spawn(move || {
                let (cx, mut request) = tracer.start(&Context::new(), format!("request-{i}"));
                for step in 0..3 {
                    let (_, mut child) = tracer.start(&cx, format!("step-{step}"));
                    child.end();
                }
                request.set_status(Status::Ok);
                request.end();
                request.span_context().trace_id()
            })
        })
        .collect();
    let trace_ids: HashSet<TraceId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    provider.shutdown().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(trace_ids.len(), 8);
    assert_eq!(spans.len(), 32);
    for trace_id in trace_ids {
        assert_eq!(
            spans
                .iter()
                .filter(|s| s.span_context.trace_id() == trace_id)
                .count(),
            4
        );
    }
    assert!(find_span_anomalies(&spans).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spans_follow_tasks() {
    let exporter = InMemorySpanExporter::default();
    let provider = batch_provider(&exporter);
    let tracer = provider.tracer("async");

    let (cx, mut root) = tracer.start(&Context::new(), "root");
    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let tracer = tracer.clone();
            let cx = cx.clone();
            tokio::spawn(async move {
                let (_, mut span) = tracer.start(&cx, format!("task-{i}"));
                tokio::time::sleep(Duration::from_millis(1)).await;
                span.end();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    root.end();
    provider.force_flush().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 5);
    let root_id = root.span_context().span_id();
    assert_eq!(
        spans.iter().filter(|s| s.parent_span_id == root_id).count(),
        4
    );
}

#[test]
fn sampled_out_traces_still_propagate() {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .with_sampler(Sampler::AlwaysOff)
        .build();
    let tracer = provider.tracer("off");

    let (cx, mut span) = tracer.start(&Context::new(), "dropped");
    let mut headers = HashMap::new();
    TraceContextPropagator::new().inject_context(&cx, &mut headers);
    span.end();

    assert!(headers["traceparent"].ends_with("-00"));
    assert!(exporter.get_finished_spans().unwrap().is_empty());
}
