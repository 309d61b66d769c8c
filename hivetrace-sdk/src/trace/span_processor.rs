//! # Span processors
//!
//! Span processors sit between ended spans and exporters. The provider calls
//! [`SpanProcessor::on_start`] when a recording span starts and
//! [`SpanProcessor::on_end`] with the finished [`SpanData`] when it ends.
//!
//! Two processors ship with the crate:
//!
//! * [`SimpleSpanProcessor`] exports each span synchronously from the thread
//!   that ended it. Useful for tests and debugging only.
//! * [`BatchSpanProcessor`] queues spans in a bounded buffer and exports them
//!   in batches from a dedicated worker thread. `on_end` never blocks on I/O:
//!   when the buffer is full the span is dropped and counted.
//!
//! ```ascii
//!   +-----+--------------+   +-----------------------+   +-------------------+
//!   |     |              |   |                       |   |                   |
//!   |     | Span.end()   +---> BatchSpanProcessor    +---> SpanExporter      |
//!   |     |              |   |  bounded queue        |   |  (stdout, ...)    |
//!   | SDK |              |   |  worker thread        |   |                   |
//!   |     |              |   |                       |   |                   |
//!   +-----+--------------+   +-----------------------+   +-------------------+
//! ```
use crate::retry::{retry_with_exponential_backoff, RetryPolicy};
use crate::trace::{ExportResult, Span, SpanData, SpanExporter};
use futures_executor::block_on;
use futures_util::future::{self, Either};
use futures_util::pin_mut;
use hivetrace::trace::{TraceError, TraceResult};
use hivetrace::{hive_debug, hive_error, hive_warn, Context};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use std::{env, thread};

/// Delay interval between two consecutive exports.
pub(crate) const HIVETRACE_BSP_SCHEDULE_DELAY: &str = "HIVETRACE_BSP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports.
pub(crate) const HIVETRACE_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size
pub(crate) const HIVETRACE_BSP_MAX_QUEUE_SIZE: &str = "HIVETRACE_BSP_MAX_QUEUE_SIZE";
/// Default maximum queue size
pub(crate) const HIVETRACE_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to HIVETRACE_BSP_MAX_QUEUE_SIZE
pub(crate) const HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE: &str = "HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size
pub(crate) const HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;
/// Maximum allowed time to export data.
pub(crate) const HIVETRACE_BSP_EXPORT_TIMEOUT: &str = "HIVETRACE_BSP_EXPORT_TIMEOUT";
/// Default maximum allowed time to export data.
pub(crate) const HIVETRACE_BSP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;

/// How long `force_flush` waits for the worker.
const FORCE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `shutdown` waits for the worker.
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Capacity of the control channel between processor and worker.
const CONTROL_CHANNEL_CAPACITY: usize = 64;
/// Pause between attempts to hand `Shutdown` to a busy worker.
const CONTROL_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Hooks for span start and end.
///
/// Processors are only invoked for recording spans. `on_end` runs on the
/// thread that ended the span and must return quickly.
pub trait SpanProcessor: Send + Sync + Debug {
    /// Called when a recording span starts. `cx` is the parent context the
    /// span was started with.
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    /// Called exactly once per recording span, with its finished data.
    fn on_end(&self, span: SpanData);

    /// Export every span received so far.
    fn force_flush(&self) -> TraceResult<()>;

    /// Flush and release resources, giving up after `timeout`.
    fn shutdown_with_timeout(&self, timeout: Duration) -> TraceResult<()>;

    /// Flush and release resources with the default timeout of 5 seconds.
    fn shutdown(&self) -> TraceResult<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

/// Exports each sampled span as soon as it ends, on the ending thread.
#[derive(Debug)]
pub struct SimpleSpanProcessor {
    exporter: Mutex<Box<dyn SpanExporter>>,
    is_shutdown: AtomicBool,
}

impl SimpleSpanProcessor {
    /// Create a new [`SimpleSpanProcessor`] using the provided exporter.
    pub fn new(exporter: Box<dyn SpanExporter>) -> Self {
        SimpleSpanProcessor {
            exporter: Mutex::new(exporter),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl SpanProcessor for SimpleSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() || self.is_shutdown.load(Ordering::Relaxed) {
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(|_| TraceError::from("SimpleSpanProcessor mutex poison"))
            .and_then(|mut exporter| block_on(exporter.export(vec![span])));

        if let Err(err) = result {
            hive_debug!(
                name: "SimpleSpanProcessor.OnEnd.Error",
                reason = err.to_string()
            );
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        let mut exporter = self.exporter.lock()?;
        block_on(exporter.force_flush())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(TraceError::AlreadyShutdown);
        }
        self.exporter.lock()?.shutdown();
        Ok(())
    }
}

#[derive(Debug)]
enum BatchMessage {
    /// The queue holds at least one full batch.
    Flush,
    /// Export everything queued and report back.
    ForceFlush(SyncSender<TraceResult<()>>),
    /// Export everything queued, shut the exporter down and exit.
    Shutdown(SyncSender<TraceResult<()>>),
}

/// State shared between the processor handle and its worker thread.
#[derive(Debug)]
struct BatchShared {
    queue: Mutex<VecDeque<SpanData>>,
    max_queue_size: usize,
    dropped_span_count: AtomicUsize,
    failed_span_count: AtomicUsize,
    flush_requested: AtomicBool,
}

impl BatchShared {
    fn record_dropped(&self, count: usize) {
        if count == 0 {
            return;
        }
        if self.dropped_span_count.fetch_add(count, Ordering::Relaxed) == 0 {
            hive_warn!(
                name: "BatchSpanProcessor.SpanDroppingStarted",
                message = "queue full or processor shut down, spans are being dropped; the total is logged at shutdown"
            );
        }
    }

    fn discard_queued(&self) -> usize {
        let discarded = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).count(),
            Err(_) => 0,
        };
        self.record_dropped(discarded);
        discarded
    }
}

/// Buffers ended spans and exports them in batches from a worker thread.
///
/// A batch is exported when the queue holds `max_export_batch_size` spans,
/// when `scheduled_delay` elapsed since the last export, on `force_flush` and
/// on `shutdown`. Exports run one at a time, are bounded by
/// `max_export_timeout` per attempt and retried according to the
/// [`RetryPolicy`]. Spans from a batch that still fails are counted in
/// [`failed_span_count`](BatchSpanProcessor::failed_span_count); spans that
/// did not fit in the queue in
/// [`dropped_span_count`](BatchSpanProcessor::dropped_span_count).
///
/// ```
/// use hivetrace_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, InMemorySpanExporter, TracerProvider};
/// use std::time::Duration;
///
/// let processor = BatchSpanProcessor::builder(InMemorySpanExporter::default())
///     .with_batch_config(
///         BatchConfigBuilder::default()
///             .with_max_queue_size(4096)
///             .with_scheduled_delay(Duration::from_millis(500))
///             .build(),
///     )
///     .build();
///
/// let provider = TracerProvider::builder()
///     .with_span_processor(processor)
///     .build();
/// # provider.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct BatchSpanProcessor {
    shared: Arc<BatchShared>,
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    max_export_batch_size: usize,
    is_shutdown: AtomicBool,
}

impl BatchSpanProcessor {
    /// Creates a new instance of `BatchSpanProcessor`.
    pub fn new<E>(mut exporter: E, config: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        let (message_sender, message_receiver) = mpsc::sync_channel(CONTROL_CHANNEL_CAPACITY);
        let shared = Arc::new(BatchShared {
            queue: Mutex::new(VecDeque::with_capacity(config.max_queue_size.min(4_096))),
            max_queue_size: config.max_queue_size,
            dropped_span_count: AtomicUsize::new(0),
            failed_span_count: AtomicUsize::new(0),
            flush_requested: AtomicBool::new(false),
        });
        let max_export_batch_size = config.max_export_batch_size;

        let worker_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("HivetraceBatchSpanProcessor".to_string())
            .spawn(move || {
                hive_debug!(
                    name: "BatchSpanProcessor.ThreadStarted",
                    interval_in_millisecs = config.scheduled_delay.as_millis() as u64,
                    max_export_batch_size = config.max_export_batch_size,
                    max_queue_size = config.max_queue_size
                );
                let mut last_export_time = Instant::now();

                loop {
                    let remaining_time = config
                        .scheduled_delay
                        .saturating_sub(last_export_time.elapsed());

                    match message_receiver.recv_timeout(remaining_time) {
                        Ok(BatchMessage::Flush) => {
                            worker_shared.flush_requested.store(false, Ordering::Release);
                            let _ = export_queued(&mut exporter, &worker_shared, &config, true);
                        }
                        Ok(BatchMessage::ForceFlush(sender)) => {
                            hive_debug!(name: "BatchSpanProcessor.ExportingDueToForceFlush");
                            let result =
                                export_queued(&mut exporter, &worker_shared, &config, false)
                                    .and_then(|_| block_on(exporter.force_flush()));
                            let _ = sender.send(result);
                            last_export_time = Instant::now();
                        }
                        Ok(BatchMessage::Shutdown(sender)) => {
                            hive_debug!(name: "BatchSpanProcessor.ExportingDueToShutdown");
                            let result =
                                export_queued(&mut exporter, &worker_shared, &config, false);
                            exporter.shutdown();
                            let _ = sender.send(result);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let _ = export_queued(&mut exporter, &worker_shared, &config, false);
                            last_export_time = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // processor handle dropped without shutdown
                            let _ = export_queued(&mut exporter, &worker_shared, &config, false);
                            exporter.shutdown();
                            break;
                        }
                    }
                }
                hive_debug!(name: "BatchSpanProcessor.ThreadStopped");
            });

        let (handle, is_shutdown) = match spawned {
            Ok(handle) => (Some(handle), false),
            Err(err) => {
                hive_error!(
                    name: "BatchSpanProcessor.ThreadSpawnFailed",
                    error = err.to_string(),
                    message = "spans will be dropped"
                );
                (None, true)
            }
        };

        BatchSpanProcessor {
            shared,
            message_sender,
            handle: Mutex::new(handle),
            max_export_batch_size,
            is_shutdown: AtomicBool::new(is_shutdown),
        }
    }

    /// A builder using the configuration read from the environment.
    pub fn builder<E>(exporter: E) -> BatchSpanProcessorBuilder<E>
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
        }
    }

    /// Spans rejected because the queue was full or the processor was shut
    /// down, plus spans still queued when a shutdown timed out.
    pub fn dropped_span_count(&self) -> usize {
        self.shared.dropped_span_count.load(Ordering::Relaxed)
    }

    /// Spans that were handed to the exporter but never exported
    /// successfully.
    pub fn failed_span_count(&self) -> usize {
        self.shared.failed_span_count.load(Ordering::Relaxed)
    }

    /// Spans currently waiting in the queue.
    pub fn queued_span_count(&self) -> usize {
        self.shared.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    fn send_control(&self, message: BatchMessage) -> TraceResult<()> {
        self.message_sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => TraceError::from("BatchSpanProcessor control channel full"),
            TrySendError::Disconnected(_) => TraceError::AlreadyShutdown,
        })
    }

    /// Like `send_control`, but waits for room in the channel until
    /// `deadline`.
    fn send_control_before(
        &self,
        mut message: BatchMessage,
        deadline: Instant,
    ) -> TraceResult<()> {
        loop {
            match self.message_sender.try_send(message) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(TraceError::AlreadyShutdown),
                Err(TrySendError::Full(returned)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TraceError::from("BatchSpanProcessor control channel full"));
                    }
                    message = returned;
                    thread::sleep(CONTROL_RETRY_INTERVAL.min(deadline - now));
                }
            }
        }
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }

        if self.is_shutdown.load(Ordering::Relaxed) {
            self.shared.record_dropped(1);
            return;
        }

        let queue_len = match self.shared.queue.lock() {
            Ok(mut queue) if queue.len() < self.shared.max_queue_size => {
                queue.push_back(span);
                Some(queue.len())
            }
            _ => None,
        };

        let Some(queue_len) = queue_len else {
            self.shared.record_dropped(1);
            return;
        };

        // One pending Flush is enough; the worker drains all full batches.
        if queue_len >= self.max_export_batch_size
            && !self.shared.flush_requested.swap(true, Ordering::AcqRel)
            && self.message_sender.try_send(BatchMessage::Flush).is_err()
        {
            self.shared.flush_requested.store(false, Ordering::Release);
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let (sender, receiver) = mpsc::sync_channel(1);
        self.send_control(BatchMessage::ForceFlush(sender))?;

        receiver
            .recv_timeout(FORCE_FLUSH_TIMEOUT)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => TraceError::ExportTimedOut(FORCE_FLUSH_TIMEOUT),
                RecvTimeoutError::Disconnected => {
                    TraceError::from("BatchSpanProcessor worker exited during force flush")
                }
            })?
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(TraceError::AlreadyShutdown);
        }

        let deadline = Instant::now() + timeout;
        let (sender, receiver) = mpsc::sync_channel(1);
        let sent = self.send_control_before(BatchMessage::Shutdown(sender), deadline);
        let result = match sent {
            Err(err) => Err(err),
            Ok(()) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(remaining) {
                    Ok(result) => {
                        if let Ok(mut handle) = self.handle.lock() {
                            if let Some(handle) = handle.take() {
                                let _ = handle.join();
                            }
                        }
                        result
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        let discarded = self.shared.discard_queued();
                        hive_error!(
                            name: "BatchSpanProcessor.Shutdown.Timeout",
                            timeout_in_millisecs = timeout.as_millis() as u64,
                            discarded_spans = discarded
                        );
                        Err(TraceError::ExportTimedOut(timeout))
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        Err(TraceError::from("BatchSpanProcessor worker exited during shutdown"))
                    }
                }
            }
        };

        // Spans that raced the shutdown message never reach the exporter.
        self.shared.discard_queued();

        let dropped = self.dropped_span_count();
        let failed = self.failed_span_count();
        if dropped > 0 || failed > 0 {
            hive_warn!(
                name: "BatchSpanProcessor.SpansLost",
                dropped_spans = dropped,
                failed_spans = failed,
                message = "raise the queue size or check the exporter if this happens often"
            );
        }
        result
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::Relaxed) {
            let _ = self.shutdown();
        }
    }
}

/// Exports the spans queued at call time, in batches of at most
/// `max_export_batch_size`. With `full_batches_only`, a trailing partial
/// batch is left for the next scheduled export.
fn export_queued(
    exporter: &mut impl SpanExporter,
    shared: &BatchShared,
    config: &BatchConfig,
    full_batches_only: bool,
) -> TraceResult<()> {
    // Snapshot the length so a steady stream of new spans can't keep the
    // worker here forever.
    let mut remaining = shared.queue.lock()?.len();
    let mut result = Ok(());

    while remaining > 0 {
        if full_batches_only && remaining < config.max_export_batch_size {
            break;
        }
        let batch: Vec<SpanData> = {
            let mut queue = shared.queue.lock()?;
            let count = remaining.min(config.max_export_batch_size).min(queue.len());
            queue.drain(..count).collect()
        };
        if batch.is_empty() {
            break;
        }
        remaining -= batch.len();

        let span_count = batch.len();
        if let Err(err) = export_batch(exporter, batch, config) {
            shared
                .failed_span_count
                .fetch_add(span_count, Ordering::Relaxed);
            result = Err(err);
        }
    }

    result
}

fn export_batch(
    exporter: &mut impl SpanExporter,
    batch: Vec<SpanData>,
    config: &BatchConfig,
) -> ExportResult {
    let span_count = batch.len();
    let timeout = config.max_export_timeout;

    let result = block_on(retry_with_exponential_backoff(
        config.retry_policy,
        "BatchSpanProcessor.Export",
        || {
            let export = exporter.export(batch.clone());
            async move {
                let timer = futures_timer::Delay::new(timeout);
                pin_mut!(timer);
                match future::select(export, timer).await {
                    Either::Left((export_result, _)) => export_result,
                    Either::Right((_, _)) => Err(TraceError::ExportTimedOut(timeout)),
                }
            }
        },
    ));

    if let Err(err) = &result {
        hive_error!(
            name: "BatchSpanProcessor.ExportFailed",
            error = err.to_string(),
            span_count = span_count
        );
    }
    result
}

/// Builder for [`BatchSpanProcessor`].
#[derive(Debug)]
pub struct BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    /// Set the batch configuration, replacing the one read from the
    /// environment.
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Build a new instance of `BatchSpanProcessor`.
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporter, self.config)
    }
}

/// Batch span processor configuration.
/// Use [`BatchConfigBuilder`] to configure your own instance of [`BatchConfig`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// The maximum queue size to buffer spans for delayed processing. If the
    /// queue gets full it drops the spans. The default value of is 2048.
    pub(crate) max_queue_size: usize,

    /// The delay interval between two consecutive processing of batches. The
    /// default value is 5 seconds.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of spans to process in a single batch. If there are
    /// more than one batch worth of spans then it processes multiple batches
    /// of spans one batch after the other without any delay. The default value
    /// is 512.
    pub(crate) max_export_batch_size: usize,

    /// The maximum duration of one export attempt. The default value is 30
    /// seconds.
    pub(crate) max_export_timeout: Duration,

    /// How failed exports are retried.
    pub(crate) retry_policy: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

impl BatchConfig {
    /// The maximum number of queued spans.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// The interval between scheduled exports.
    pub fn scheduled_delay(&self) -> Duration {
        self.scheduled_delay
    }

    /// The maximum number of spans per export.
    pub fn max_export_batch_size(&self) -> usize {
        self.max_export_batch_size
    }

    /// The time limit of a single export attempt.
    pub fn max_export_timeout(&self) -> Duration {
        self.max_export_timeout
    }
}

/// A builder for creating [`BatchConfig`] instances.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    max_export_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for BatchConfigBuilder {
    /// Create a new [`BatchConfigBuilder`] with the default values,
    /// overridden by environment variables if set.
    /// The supported environment variables are:
    /// * `HIVETRACE_BSP_MAX_QUEUE_SIZE`
    /// * `HIVETRACE_BSP_SCHEDULE_DELAY`
    /// * `HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE`
    /// * `HIVETRACE_BSP_EXPORT_TIMEOUT`
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: HIVETRACE_BSP_MAX_QUEUE_SIZE_DEFAULT,
            scheduled_delay: Duration::from_millis(HIVETRACE_BSP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            max_export_timeout: Duration::from_millis(HIVETRACE_BSP_EXPORT_TIMEOUT_DEFAULT),
            retry_policy: RetryPolicy::default(),
        }
        .init_from_env_vars()
    }
}

impl BatchConfigBuilder {
    /// Set max_queue_size for [`BatchConfigBuilder`].
    /// It's the maximum queue size to buffer spans for delayed processing.
    /// If the queue gets full it will drop the spans.
    /// The default value of is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set max_export_batch_size for [`BatchConfigBuilder`].
    /// It's the maximum number of spans to process in a single batch. If there are
    /// more than one batch worth of spans then it processes multiple batches
    /// of spans one batch after the other without any delay.
    /// The default value is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Set scheduled_delay_duration for [`BatchConfigBuilder`].
    /// It's the delay interval in milliseconds between two consecutive processing of batches.
    /// The default value is 5000 milliseconds.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set max_export_timeout for [`BatchConfigBuilder`].
    /// It's the maximum duration of one export attempt.
    /// The default value is 30000 milliseconds.
    pub fn with_max_export_timeout(mut self, max_export_timeout: Duration) -> Self {
        self.max_export_timeout = max_export_timeout;
        self
    }

    /// Set the retry policy applied to failed exports.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Builds a `BatchConfig` enforcing the following invariants:
    /// * `max_queue_size` and `max_export_batch_size` are at least 1.
    /// * `max_export_batch_size` is less than or equal to `max_queue_size`.
    pub fn build(self) -> BatchConfig {
        let max_queue_size = self.max_queue_size.max(1);
        let max_export_batch_size = self.max_export_batch_size.clamp(1, max_queue_size);

        BatchConfig {
            max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_batch_size,
            max_export_timeout: self.max_export_timeout,
            retry_policy: self.retry_policy,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(max_queue_size) = env_value::<usize>(HIVETRACE_BSP_MAX_QUEUE_SIZE) {
            self.max_queue_size = max_queue_size;
        }

        if let Some(scheduled_delay) = env_value::<u64>(HIVETRACE_BSP_SCHEDULE_DELAY) {
            self.scheduled_delay = Duration::from_millis(scheduled_delay);
        }

        if let Some(max_export_batch_size) = env_value::<usize>(HIVETRACE_BSP_MAX_EXPORT_BATCH_SIZE)
        {
            self.max_export_batch_size = max_export_batch_size;
        }

        if let Some(max_export_timeout) = env_value::<u64>(HIVETRACE_BSP_EXPORT_TIMEOUT) {
            self.max_export_timeout = Duration::from_millis(max_export_timeout);
        }

        self
    }
}

fn env_value<T: FromStr>(name: &'static str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match T::from_str(raw.trim()) {
        Ok(value) => Some(value),
        Err(_) => {
            hive_warn!(
                name: "BatchConfig.InvalidEnvValue",
                variable = name,
                value = raw.as_str(),
                message = "ignoring value that is not a non-negative integer"
            );
            None
        }
    }
}
