use chrono::{LocalResult, TimeZone, Utc};
use hivetrace::trace::SpanId;
use hivetrace_sdk::trace::InstrumentationScope;
use hivetrace_sdk::Resource;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// One exported batch in its serializable form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpanBatch {
    resource_spans: Vec<ResourceSpans>,
}

impl From<Vec<hivetrace_sdk::trace::SpanData>> for SpanBatch {
    fn from(sdk_spans: Vec<hivetrace_sdk::trace::SpanData>) -> Self {
        // Batches mix few resources, a linear scan beats hashing attribute sets.
        let mut groups: Vec<(Arc<Resource>, ResourceSpans)> = Vec::new();
        for sdk_span in sdk_spans {
            let position = groups.iter().position(|(resource, _)| {
                Arc::ptr_eq(resource, &sdk_span.resource) || **resource == *sdk_span.resource
            });
            let index = match position {
                Some(index) => index,
                None => {
                    groups.push((
                        sdk_span.resource.clone(),
                        ResourceSpans {
                            resource: sdk_span.resource.as_ref().into(),
                            scope_spans: Vec::with_capacity(1),
                        },
                    ));
                    groups.len() - 1
                }
            };

            let scope = Scope::from(&sdk_span.instrumentation_scope);
            let scope_spans = &mut groups[index].1.scope_spans;
            match scope_spans.iter_mut().find(|ss| ss.scope == scope) {
                Some(ss) => ss.spans.push(sdk_span.into()),
                None => scope_spans.push(ScopeSpans {
                    scope,
                    spans: vec![sdk_span.into()],
                }),
            }
        }

        SpanBatch {
            resource_spans: groups.into_iter().map(|(_, rs)| rs).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSpans {
    resource: ResourceAttributes,
    scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceAttributes {
    attributes: Vec<KeyValue>,
}

impl From<&Resource> for ResourceAttributes {
    fn from(resource: &Resource) -> Self {
        ResourceAttributes {
            attributes: resource
                .iter()
                .map(|(key, value)| KeyValue {
                    key: key.as_str().to_owned(),
                    value: value.into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeSpans {
    scope: Scope,
    spans: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Scope {
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl From<&InstrumentationScope> for Scope {
    fn from(scope: &InstrumentationScope) -> Self {
        Scope {
            name: scope.name().to_owned(),
            version: scope.version().map(str::to_owned),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Span {
    trace_id: String,
    span_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    parent_span_id: String,
    name: Cow<'static, str>,
    kind: SpanKind,
    sampled: bool,
    #[serde(serialize_with = "as_unix_nano")]
    start_time_unix_nano: SystemTime,
    #[serde(serialize_with = "as_human_readable")]
    start_time: SystemTime,
    #[serde(serialize_with = "as_unix_nano")]
    end_time_unix_nano: SystemTime,
    #[serde(serialize_with = "as_human_readable")]
    end_time: SystemTime,
    attributes: Vec<KeyValue>,
    #[serde(skip_serializing_if = "is_zero")]
    dropped_attributes_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<Event>,
    #[serde(skip_serializing_if = "is_zero")]
    dropped_events_count: u32,
    status: Status,
}

impl From<hivetrace_sdk::trace::SpanData> for Span {
    fn from(value: hivetrace_sdk::trace::SpanData) -> Self {
        Span {
            trace_id: value.span_context.trace_id().to_string(),
            span_id: value.span_context.span_id().to_string(),
            parent_span_id: Some(value.parent_span_id)
                .filter(|id| *id != SpanId::INVALID)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            name: value.name,
            kind: value.span_kind.into(),
            sampled: value.span_context.is_sampled(),
            start_time_unix_nano: value.start_time,
            start_time: value.start_time,
            end_time_unix_nano: value.end_time,
            end_time: value.end_time,
            attributes: value.attributes.iter().map(Into::into).collect(),
            dropped_attributes_count: value.dropped_attributes_count,
            events: value.events.into_iter().map(Into::into).collect(),
            dropped_events_count: value.dropped_events_count,
            status: value.status.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SpanKind {
    Internal = 1,
    Server = 2,
    Client = 3,
}

impl Serialize for SpanKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

impl From<hivetrace::trace::SpanKind> for SpanKind {
    fn from(value: hivetrace::trace::SpanKind) -> Self {
        match value {
            hivetrace::trace::SpanKind::Client => SpanKind::Client,
            hivetrace::trace::SpanKind::Server => SpanKind::Server,
            hivetrace::trace::SpanKind::Internal => SpanKind::Internal,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    name: Cow<'static, str>,
    #[serde(serialize_with = "as_unix_nano")]
    time_unix_nano: SystemTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<KeyValue>,
    #[serde(skip_serializing_if = "is_zero")]
    dropped_attributes_count: u32,
}

impl From<hivetrace::trace::Event> for Event {
    fn from(value: hivetrace::trace::Event) -> Self {
        Event {
            name: value.name,
            time_unix_nano: value.timestamp,
            attributes: value.attributes.iter().map(Into::into).collect(),
            dropped_attributes_count: value.dropped_attributes_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "is_zero")]
    code: u32,
}

impl From<hivetrace::trace::Status> for Status {
    fn from(value: hivetrace::trace::Status) -> Self {
        match value {
            hivetrace::trace::Status::Unset => Status {
                message: None,
                code: 0,
            },
            hivetrace::trace::Status::Error { description } => Status {
                message: Some(description),
                code: 1,
            },
            hivetrace::trace::Status::Ok => Status {
                message: None,
                code: 2,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyValue {
    key: String,
    value: Value,
}

impl From<&hivetrace::KeyValue> for KeyValue {
    fn from(kv: &hivetrace::KeyValue) -> Self {
        KeyValue {
            key: kv.key.as_str().to_owned(),
            value: (&kv.value).into(),
        }
    }
}

#[derive(Debug, Serialize)]
enum Value {
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "intValue")]
    Int(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "stringValue")]
    String(String),
}

impl From<&hivetrace::Value> for Value {
    fn from(value: &hivetrace::Value) -> Self {
        match value {
            hivetrace::Value::Bool(b) => Value::Bool(*b),
            hivetrace::Value::I64(i) => Value::Int(*i),
            hivetrace::Value::F64(f) => Value::Double(*f),
            hivetrace::Value::String(s) => Value::String(s.to_string()),
        }
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn as_unix_nano<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    serializer.serialize_u64(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn as_human_readable<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();

    match Utc.timestamp_opt(since_epoch.as_secs() as i64, since_epoch.subsec_nanos()) {
        LocalResult::Single(datetime) => {
            serializer.serialize_str(&datetime.format("%Y-%m-%d %H:%M:%S.%3f").to_string())
        }
        _ => Err(serde::ser::Error::custom("Invalid Timestamp.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivetrace::trace::{SpanContext, SpanKind as ApiSpanKind, Status as ApiStatus, TraceFlags};
    use hivetrace_sdk::testing::trace::new_test_span_data;
    use std::time::Duration;

    fn to_json(spans: Vec<hivetrace_sdk::trace::SpanData>) -> serde_json::Value {
        serde_json::to_value(SpanBatch::from(spans)).unwrap()
    }

    #[test]
    fn span_fields_use_camel_case_and_hex_ids() {
        let mut span = new_test_span_data(true);
        span.span_kind = ApiSpanKind::Server;
        span.status = ApiStatus::error("upstream returned 502");
        span.attributes = vec![hivetrace::KeyValue::new("isTrue", true)];
        span.start_time = UNIX_EPOCH + Duration::from_millis(1_500);
        span.end_time = span.start_time;

        let json = to_json(vec![span.clone()]);
        let exported = &json["resourceSpans"][0]["scopeSpans"][0]["spans"][0];

        assert_eq!(
            exported["traceId"],
            span.span_context.trace_id().to_string().as_str()
        );
        assert_eq!(exported["kind"], 2);
        assert_eq!(exported["sampled"], true);
        assert_eq!(exported["startTimeUnixNano"], 1_500_000_000u64);
        assert_eq!(exported["startTime"], "1970-01-01 00:00:01.500");
        assert_eq!(exported["status"]["code"], 1);
        assert_eq!(exported["status"]["message"], "upstream returned 502");
        assert_eq!(exported["attributes"][0]["key"], "isTrue");
        assert_eq!(exported["attributes"][0]["value"]["boolValue"], true);
        assert!(exported.get("parentSpanId").is_none());
    }

    #[test]
    fn child_span_carries_parent_id() {
        let parent = new_test_span_data(true);
        let mut child = new_test_span_data(true);
        child.span_context = SpanContext::new(
            parent.span_context.trace_id(),
            child.span_context.span_id(),
            TraceFlags::SAMPLED,
            false,
        );
        child.parent_span_id = parent.span_context.span_id();

        let json = to_json(vec![child]);
        assert_eq!(
            json["resourceSpans"][0]["scopeSpans"][0]["spans"][0]["parentSpanId"],
            parent.span_context.span_id().to_string().as_str()
        );
    }

    #[test]
    fn spans_are_grouped_by_resource_and_scope() {
        let first = new_test_span_data(true);
        let second = new_test_span_data(true);
        let mut other_scope = new_test_span_data(true);
        other_scope.instrumentation_scope = InstrumentationScope::new("other").with_version("1.0");
        let mut other_resource = new_test_span_data(true);
        other_resource.resource = Arc::new(
            Resource::builder_empty()
                .with_service_name("secondary-server")
                .build(),
        );

        let json = to_json(vec![first, second, other_scope, other_resource]);
        let resource_spans = json["resourceSpans"].as_array().unwrap();
        assert_eq!(resource_spans.len(), 2);

        let scope_spans = resource_spans[0]["scopeSpans"].as_array().unwrap();
        assert_eq!(scope_spans.len(), 2);
        assert_eq!(scope_spans[0]["spans"].as_array().unwrap().len(), 2);
        assert_eq!(scope_spans[1]["scope"]["name"], "other");
        assert_eq!(scope_spans[1]["scope"]["version"], "1.0");

        assert_eq!(
            resource_spans[1]["resource"]["attributes"][0]["value"]["stringValue"],
            "secondary-server"
        );
    }
}
