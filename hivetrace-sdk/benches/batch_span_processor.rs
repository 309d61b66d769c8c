use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_util::future::BoxFuture;
use hivetrace::Context;
use hivetrace_sdk::testing::trace::new_test_span_data;
use hivetrace_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, ExportResult, SpanData, SpanExporter, SpanProcessor,
    TracerProvider,
};
use std::sync::Arc;
use std::thread;

#[derive(Debug)]
struct NoopSpanExporter;

impl SpanExporter for NoopSpanExporter {
    fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        Box::pin(std::future::ready(Ok(())))
    }
}

fn on_end_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("BatchSpanProcessor");
    group.sample_size(50);

    for threads in [1, 2, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("on_end with {threads} threads")),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let processor = Arc::new(BatchSpanProcessor::new(
                        NoopSpanExporter,
                        BatchConfigBuilder::default()
                            .with_max_queue_size(10_000)
                            .build(),
                    ));
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let processor = processor.clone();
                            thread::spawn(move || {
                                for _ in 0..200 {
                                    processor.on_end(new_test_span_data(true));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    let _ = processor.shutdown();
                })
            },
        );
    }

    group.finish();
}

fn start_and_end(c: &mut Criterion) {
    let provider = TracerProvider::builder()
        .with_span_processor(BatchSpanProcessor::new(
            NoopSpanExporter,
            BatchConfigBuilder::default().build(),
        ))
        .build();
    let tracer = provider.tracer("bench");
    let root = Context::new();

    c.bench_function("Tracer.start_nested", |b| {
        b.iter(|| {
            let (cx, mut parent) = tracer.start(&root, "parent");
            let (_, mut child) = tracer.start(&cx, "child");
            child.end();
            parent.end();
        })
    });
}

criterion_group!(benches, on_end_contention, start_and_end);
criterion_main!(benches);
