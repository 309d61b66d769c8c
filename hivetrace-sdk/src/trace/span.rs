//! # Span
//!
//! A [`Span`] records one unit of work: its name, kind, start and end time,
//! attributes, events and status. It is owned by the task that started it and
//! mutated through `&mut self` only, so one span is never written from two
//! tasks at once. [`SharedSpan`] exists for the one case where ownership has
//! to be split, an interceptor handing its server span to the handler it
//! wraps.
//!
//! Ending a span freezes it. The first `end` wins: it stamps the end time and
//! hands the finished [`SpanData`] to every span processor exactly once. Later
//! `end` calls are ignored, and so is any other mutation: the `try_*` methods
//! report it as [`TraceError::SpanEnded`], the plain ones log a warning.
//! Dropping a span that was never ended ends it, which keeps cancelled work
//! from leaking unreported spans.
use crate::trace::{SpanData, SpanLimits, Tracer};
use hivetrace::hive_warn;
use hivetrace::trace::{Event, SpanContext, SpanId, SpanKind, Status, TraceError, TraceResult};
use hivetrace::KeyValue;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Single operation within a trace.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    data: Option<SpanRecord>,
    ended: bool,
    tracer: Tracer,
    span_limits: SpanLimits,
}

/// The mutable part of a recording span.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SpanRecord {
    pub(crate) parent_span_id: SpanId,
    pub(crate) span_kind: SpanKind,
    pub(crate) name: Cow<'static, str>,
    pub(crate) start_time: SystemTime,
    pub(crate) attributes: Vec<KeyValue>,
    pub(crate) dropped_attributes_count: u32,
    pub(crate) events: Vec<Event>,
    pub(crate) dropped_events_count: u32,
    pub(crate) status: Status,
}

impl Span {
    pub(crate) fn new(
        span_context: SpanContext,
        data: Option<SpanRecord>,
        tracer: Tracer,
        span_limits: SpanLimits,
    ) -> Self {
        Span {
            span_context,
            data,
            ended: false,
            tracer,
            span_limits,
        }
    }

    /// Returns the `SpanContext` of this span. Valid before and after `end`.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns `true` while the span records attributes, events and status.
    ///
    /// Always `false` after `end` and for spans the sampler dropped.
    pub fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    /// Returns `true` once `end` or `end_with_timestamp` was called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Sets a single attribute. An existing value for the same key is
    /// replaced.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        if let Err(err) = self.try_set_attribute(attribute) {
            self.report_late_mutation("set_attribute", err);
        }
    }

    /// Sets several attributes; for duplicate keys the last one wins.
    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        for attribute in attributes {
            self.set_attribute(attribute);
        }
    }

    /// Like [`set_attribute`](Span::set_attribute) but fails with
    /// [`TraceError::SpanEnded`] once the span ended.
    pub fn try_set_attribute(&mut self, attribute: KeyValue) -> TraceResult<()> {
        let limit = self.span_limits.max_attributes_per_span as usize;
        self.with_data(|data| record_attribute(data, attribute, limit))
    }

    /// Records an event stamped with the current time.
    pub fn add_event<T>(&mut self, name: T, attributes: Vec<KeyValue>)
    where
        T: Into<Cow<'static, str>>,
    {
        self.add_event_with_timestamp(name, SystemTime::now(), attributes)
    }

    /// Records an event at a specific time.
    pub fn add_event_with_timestamp<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        if let Err(err) = self.try_add_event(name, timestamp, attributes) {
            self.report_late_mutation("add_event", err);
        }
    }

    /// Like [`add_event_with_timestamp`](Span::add_event_with_timestamp) but
    /// fails with [`TraceError::SpanEnded`] once the span ended.
    pub fn try_add_event<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) -> TraceResult<()>
    where
        T: Into<Cow<'static, str>>,
    {
        let events_limit = self.span_limits.max_events_per_span as usize;
        let event_attributes_limit = self.span_limits.max_attributes_per_event as usize;
        self.with_data(|data| {
            record_event(
                data,
                name.into(),
                timestamp,
                attributes,
                events_limit,
                event_attributes_limit,
            )
        })
    }

    /// Sets the status of this span.
    ///
    /// Statuses only move up the order `Unset < Error < Ok`.
    pub fn set_status(&mut self, status: Status) {
        let result = self.with_data(|data| {
            if status > data.status {
                data.status = status;
            }
        });
        if let Err(err) = result {
            self.report_late_mutation("set_status", err);
        }
    }

    /// Updates the span's name.
    pub fn update_name<T>(&mut self, new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        if let Err(err) = self.with_data(|data| data.name = new_name.into()) {
            self.report_late_mutation("update_name", err);
        }
    }

    /// Ends the span now.
    ///
    /// Only the first call has an effect.
    pub fn end(&mut self) {
        self.end_with_optional_timestamp(None);
    }

    /// Ends the span at `timestamp`, clamped so that the end never precedes
    /// the start.
    ///
    /// Only the first call has an effect.
    pub fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        self.end_with_optional_timestamp(Some(timestamp));
    }

    /// Returns a copy of what the span recorded so far, as it would be
    /// exported if it ended now.
    pub fn exported_data(&self) -> Option<SpanData> {
        self.data.as_ref().map(|data| {
            build_export_data(
                data.clone(),
                self.span_context,
                &self.tracer,
                SystemTime::now(),
            )
        })
    }

    fn with_data<T, F>(&mut self, f: F) -> TraceResult<T>
    where
        F: FnOnce(&mut SpanRecord) -> T,
        T: Default,
    {
        if self.ended {
            return Err(TraceError::SpanEnded);
        }
        Ok(self.data.as_mut().map(f).unwrap_or_default())
    }

    fn report_late_mutation(&self, operation: &'static str, err: TraceError) {
        hive_warn!(
            name: "Span.MutationAfterEnd",
            operation = operation,
            span_id = self.span_context.span_id().to_string(),
            error = err.to_string()
        );
    }

    fn end_with_optional_timestamp(&mut self, timestamp: Option<SystemTime>) {
        if self.ended {
            return;
        }
        self.ended = true;

        // Non-recording spans have nothing to report.
        let Some(data) = self.data.take() else {
            return;
        };

        // Processors drop and count spans that end after shutdown.
        let provider = self.tracer.provider();
        let end_time = timestamp.unwrap_or_else(SystemTime::now);
        let span_data = build_export_data(data, self.span_context, &self.tracer, end_time);
        match provider.span_processors() {
            [] => {}
            [processor] => processor.on_end(span_data),
            processors => {
                for processor in processors {
                    processor.on_end(span_data.clone());
                }
            }
        }
    }
}

impl Drop for Span {
    /// Report span on inner drop
    fn drop(&mut self) {
        self.end_with_optional_timestamp(None);
    }
}

fn build_export_data(
    data: SpanRecord,
    span_context: SpanContext,
    tracer: &Tracer,
    end_time: SystemTime,
) -> SpanData {
    SpanData {
        span_context,
        parent_span_id: data.parent_span_id,
        span_kind: data.span_kind,
        name: data.name,
        start_time: data.start_time,
        end_time: end_time.max(data.start_time),
        attributes: data.attributes,
        dropped_attributes_count: data.dropped_attributes_count,
        events: data.events,
        dropped_events_count: data.dropped_events_count,
        status: data.status,
        resource: tracer.provider().config().resource.clone(),
        instrumentation_scope: tracer.instrumentation_scope().clone(),
    }
}

pub(crate) fn record_attribute(data: &mut SpanRecord, attribute: KeyValue, limit: usize) {
    if let Some(existing) = data
        .attributes
        .iter_mut()
        .find(|existing| existing.key == attribute.key)
    {
        existing.value = attribute.value;
    } else if data.attributes.len() < limit {
        data.attributes.push(attribute);
    } else {
        data.dropped_attributes_count += 1;
    }
}

fn record_event(
    data: &mut SpanRecord,
    name: Cow<'static, str>,
    timestamp: SystemTime,
    mut attributes: Vec<KeyValue>,
    events_limit: usize,
    event_attributes_limit: usize,
) {
    if data.events.len() < events_limit {
        let dropped_attributes_count = attributes.len().saturating_sub(event_attributes_limit);
        attributes.truncate(event_attributes_limit);
        data.events.push(Event::new(
            name,
            timestamp,
            attributes,
            dropped_attributes_count as u32,
        ));
    } else {
        data.dropped_events_count += 1;
    }
}

/// A span that several owners can reach, behind a mutex.
///
/// Interceptors use it to lend the server span to the handler they wrap:
/// the handler annotates it, the interceptor ends it when the handler
/// returns. Ending through any clone ends the span for all of them.
#[derive(Clone, Debug)]
pub struct SharedSpan {
    span_context: SpanContext,
    inner: Arc<Mutex<Span>>,
}

impl SharedSpan {
    /// Wrap `span` for shared access.
    pub fn new(span: Span) -> Self {
        SharedSpan {
            span_context: *span.span_context(),
            inner: Arc::new(Mutex::new(span)),
        }
    }

    /// The wrapped span's context; does not take the lock.
    pub fn span_context(&self) -> SpanContext {
        self.span_context
    }

    /// Run `f` on the wrapped span. Returns `None` if the lock was poisoned.
    pub fn with_span<T>(&self, f: impl FnOnce(&mut Span) -> T) -> Option<T> {
        self.inner.lock().ok().map(|mut span| f(&mut span))
    }

    /// See [`Span::set_attribute`].
    pub fn set_attribute(&self, attribute: KeyValue) {
        self.with_span(|span| span.set_attribute(attribute));
    }

    /// See [`Span::set_attributes`].
    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        self.with_span(|span| span.set_attributes(attributes));
    }

    /// See [`Span::add_event`].
    pub fn add_event<T>(&self, name: T, attributes: Vec<KeyValue>)
    where
        T: Into<Cow<'static, str>>,
    {
        self.with_span(|span| span.add_event(name, attributes));
    }

    /// See [`Span::set_status`].
    pub fn set_status(&self, status: Status) {
        self.with_span(|span| span.set_status(status));
    }

    /// See [`Span::end`].
    pub fn end(&self) {
        self.with_span(|span| span.end());
    }
}
