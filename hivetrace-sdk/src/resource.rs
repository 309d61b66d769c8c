//! The entity producing spans.
//!
//! A [`Resource`] is a fixed set of attributes (service name, version, ...)
//! attached to every span a [`TracerProvider`](crate::trace::TracerProvider)
//! records. It is decided once at startup and never changes afterwards.
//!
//! [`Resource::builder`] starts from the environment:
//!
//! * `HIVETRACE_RESOURCE_ATTRIBUTES`: comma separated `key=value` pairs.
//! * `HIVETRACE_SERVICE_NAME`: value of `service.name`, taking precedence over
//!   a `service.name` pair in `HIVETRACE_RESOURCE_ATTRIBUTES`.
//!
//! Without either, `service.name` is `unknown_service`. Values set through the
//! builder win over the environment.
use hivetrace::{Key, KeyValue, Value};
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

const HIVETRACE_RESOURCE_ATTRIBUTES: &str = "HIVETRACE_RESOURCE_ATTRIBUTES";
const HIVETRACE_SERVICE_NAME: &str = "HIVETRACE_SERVICE_NAME";

/// Attribute key of the logical service name.
pub const SERVICE_NAME: &str = "service.name";
/// Attribute key of the service version.
pub const SERVICE_VERSION: &str = "service.version";

const DEFAULT_SERVICE_NAME: &str = "unknown_service";

/// Immutable attributes describing the producer of the spans.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    attrs: Arc<BTreeMap<Key, Value>>,
}

impl Default for Resource {
    fn default() -> Self {
        Resource::builder().build()
    }
}

impl Resource {
    /// A resource carrying no attributes at all.
    pub fn empty() -> Self {
        Resource {
            attrs: Arc::new(BTreeMap::new()),
        }
    }

    /// Start from the environment and the default service name.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder::from_env()
    }

    /// Start from nothing, ignoring the environment.
    pub fn builder_empty() -> ResourceBuilder {
        ResourceBuilder {
            attrs: BTreeMap::new(),
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(&Key::new(key.to_owned()))
    }

    /// Iterate over the attributes, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.attrs.iter()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True when the resource has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Builder for [`Resource`].
#[derive(Debug)]
pub struct ResourceBuilder {
    attrs: BTreeMap<Key, Value>,
}

impl ResourceBuilder {
    fn from_env() -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(Key::from_static_str(SERVICE_NAME), Value::from(DEFAULT_SERVICE_NAME));

        if let Ok(raw) = env::var(HIVETRACE_RESOURCE_ATTRIBUTES) {
            for pair in raw.split_terminator(',') {
                if let Some((key, value)) = pair.split_once('=') {
                    let (key, value) = (key.trim(), value.trim());
                    if !key.is_empty() {
                        attrs.insert(Key::new(key.to_owned()), Value::from(value.to_owned()));
                    }
                }
            }
        }

        if let Some(service_name) = env::var(HIVETRACE_SERVICE_NAME)
            .ok()
            .filter(|name| !name.is_empty())
        {
            attrs.insert(Key::from_static_str(SERVICE_NAME), Value::from(service_name));
        }

        ResourceBuilder { attrs }
    }

    /// Set `service.name`.
    pub fn with_service_name(self, name: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue::new(SERVICE_NAME, name))
    }

    /// Set `service.version`.
    pub fn with_service_version(self, version: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue::new(SERVICE_VERSION, version))
    }

    /// Set one attribute, replacing any previous value for the key.
    pub fn with_attribute(mut self, kv: KeyValue) -> Self {
        self.attrs.insert(kv.key, kv.value);
        self
    }

    /// Set several attributes; later duplicates win.
    pub fn with_attributes<T: IntoIterator<Item = KeyValue>>(self, kvs: T) -> Self {
        kvs.into_iter().fold(self, |builder, kv| builder.with_attribute(kv))
    }

    /// Create the [`Resource`].
    pub fn build(self) -> Resource {
        Resource {
            attrs: Arc::new(self.attrs),
        }
    }
}
