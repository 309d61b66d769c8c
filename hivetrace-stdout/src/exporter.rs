use crate::transform::SpanBatch;
use futures_util::future::BoxFuture;
use hivetrace::hive_debug;
use hivetrace::trace::TraceError;
use hivetrace_sdk::trace::{ExportResult, SpanData};
use std::fmt;
use std::io::{stdout, Write};

/// Writes every exported batch as pretty JSON.
///
/// Defaults to stdout; [`SpanExporterBuilder::with_writer`] redirects the
/// output, which is mostly useful in tests.
pub struct SpanExporter {
    writer: Option<Box<dyn Write + Send + Sync>>,
}

impl fmt::Debug for SpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpanExporter")
    }
}

impl Default for SpanExporter {
    fn default() -> Self {
        SpanExporter::builder().build()
    }
}

impl SpanExporter {
    /// Create a builder to configure this exporter.
    pub fn builder() -> SpanExporterBuilder {
        SpanExporterBuilder::default()
    }

    fn write_batch(writer: &mut (dyn Write + Send + Sync), batch: Vec<SpanData>) -> ExportResult {
        serde_json::to_writer_pretty(&mut *writer, &SpanBatch::from(batch))
            .map_err(|err| TraceError::Other(Box::new(err)))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|err| TraceError::Other(Box::new(err)))
    }
}

impl hivetrace_sdk::trace::SpanExporter for SpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = match &mut self.writer {
            Some(writer) => Self::write_batch(writer.as_mut(), batch),
            None => Err("exporter is shut down".into()),
        };
        Box::pin(futures_util::future::ready(result))
    }

    fn shutdown(&mut self) {
        if self.writer.take().is_some() {
            hive_debug!(name: "StdoutSpanExporter.Shutdown");
        }
    }
}

/// Configuration for the stdout span exporter.
#[derive(Default)]
pub struct SpanExporterBuilder {
    writer: Option<Box<dyn Write + Send + Sync>>,
}

impl fmt::Debug for SpanExporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpanExporterBuilder")
    }
}

impl SpanExporterBuilder {
    /// Write to `writer` instead of stdout.
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: Write + Send + Sync + 'static,
    {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Create a span exporter with the current configuration.
    pub fn build(self) -> SpanExporter {
        SpanExporter {
            writer: Some(self.writer.unwrap_or_else(|| Box::new(stdout()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::block_on;
    use hivetrace_sdk::testing::trace::new_test_span_data;
    use hivetrace_sdk::trace::SpanExporter as _;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn each_batch_is_one_json_document() {
        let buffer = SharedBuffer::default();
        let mut exporter = SpanExporter::builder().with_writer(buffer.clone()).build();

        block_on(exporter.export(vec![new_test_span_data(true), new_test_span_data(true)]))
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
        let spans = json["resourceSpans"][0]["scopeSpans"][0]["spans"]
            .as_array()
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert!(buffer.contents().ends_with("}\n"));
    }

    #[test]
    fn export_after_shutdown_fails() {
        let buffer = SharedBuffer::default();
        let mut exporter = SpanExporter::builder().with_writer(buffer.clone()).build();
        exporter.shutdown();

        let result = block_on(exporter.export(vec![new_test_span_data(true)]));
        assert!(result.is_err());
        assert!(buffer.contents().is_empty());
    }
}
