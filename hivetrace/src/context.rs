use crate::trace::SpanContext;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasherDefault, Hasher};
use std::sync::Arc;

/// A request-scoped, immutable collection of values.
///
/// A [`Context`] travels alongside a unit of work (usually one inbound
/// request) and carries the span context of the span currently enclosing that
/// work plus any application values stored with [`with_value`].
///
/// Contexts are never modified in place. Every write returns a new context
/// containing the original values and the new one, so a context handed to a
/// child task can not be changed under it. There is no implicit "current"
/// context: code that starts spans takes the parent context as an argument and
/// returns the child context to its caller.
///
/// [`with_value`]: Context::with_value()
///
/// # Examples
///
/// ```
/// use hivetrace::Context;
///
/// #[derive(Debug, PartialEq)]
/// struct RequestId(u64);
///
/// let root = Context::new();
/// let cx = root.with_value(RequestId(7));
///
/// assert_eq!(cx.get::<RequestId>(), Some(&RequestId(7)));
/// assert_eq!(root.get::<RequestId>(), None);
/// ```
#[derive(Clone, Default)]
pub struct Context {
    pub(crate) span_context: Option<SpanContext>,
    entries: HashMap<TypeId, Arc<dyn Any + Sync + Send>, BuildHasherDefault<IdHasher>>,
}

impl Context {
    /// Creates an empty `Context`.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns a reference to the entry for the corresponding value type.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|rc| rc.downcast_ref())
    }

    /// Returns a copy of the context with the new value included.
    ///
    /// A value of the same type already present is replaced in the copy only.
    pub fn with_value<T: 'static + Send + Sync>(&self, value: T) -> Self {
        let mut new_context = self.clone();
        new_context
            .entries
            .insert(TypeId::of::<T>(), Arc::new(value));
        new_context
    }

    pub(crate) fn with_span_context_internal(&self, span_context: SpanContext) -> Self {
        Context {
            span_context: Some(span_context),
            entries: self.entries.clone(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("span_context", &self.span_context)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// With TypeIds as keys, there's no need to hash them. They are already hashes
/// themselves, coming from the compiler. The IdHasher just holds the u64 of
/// the TypeId, and then returns it, instead of doing any bit fiddling.
#[derive(Clone, Default, Debug)]
struct IdHasher(u64);

impl Hasher for IdHasher {
    fn write(&mut self, _: &[u8]) {
        unreachable!("TypeId calls write_u64");
    }

    #[inline]
    fn write_u64(&mut self, id: u64) {
        self.0 = id;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanId, TraceContextExt, TraceFlags, TraceId};

    #[derive(Debug, PartialEq)]
    struct ValueA(u64);

    #[derive(Debug, PartialEq)]
    struct ValueB(&'static str);

    #[test]
    fn with_value_leaves_original_untouched() {
        let a = Context::new().with_value(ValueA(1));
        let b = a.with_value(ValueB("b"));
        let replaced = b.with_value(ValueA(2));

        assert_eq!(a.get::<ValueB>(), None);
        assert_eq!(b.get::<ValueA>(), Some(&ValueA(1)));
        assert_eq!(b.get::<ValueB>(), Some(&ValueB("b")));
        assert_eq!(replaced.get::<ValueA>(), Some(&ValueA(2)));
        assert_eq!(replaced.get::<ValueB>(), Some(&ValueB("b")));
    }

    #[test]
    fn span_context_update_keeps_entries() {
        let cx = Context::new().with_value(ValueA(9));
        let sc = SpanContext::new(
            TraceId::from(1),
            SpanId::from(2),
            TraceFlags::SAMPLED,
            false,
        );
        let child = cx.with_span_context(sc);

        assert!(!cx.has_active_span());
        assert_eq!(child.span_context(), &sc);
        assert_eq!(child.get::<ValueA>(), Some(&ValueA(9)));
    }
}
