//! Id Generator
use hivetrace::trace::{SpanId, TraceId};
use rand::{rngs, Rng, SeedableRng};
use std::cell::RefCell;
use std::fmt;

/// Interface for generating IDs
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new, non-zero `TraceId`
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new, non-zero `SpanId`
    fn new_span_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] implementation.
///
/// Draws ids from a per-thread `SmallRng` seeded from the OS, so concurrent
/// requests never contend on a shared generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        CURRENT_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            loop {
                let id = rng.random::<u128>();
                if id != 0 {
                    return TraceId::from(id);
                }
            }
        })
    }

    fn new_span_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            loop {
                let id = rng.random::<u64>();
                if id != 0 {
                    return SpanId::from(id);
                }
            }
        })
    }
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

#[cfg(any(test, feature = "testing"))]
pub use increment::IncrementIdGenerator;

#[cfg(any(test, feature = "testing"))]
mod increment {
    use super::IdGenerator;
    use hivetrace::trace::{SpanId, TraceId};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// [`IdGenerator`] handing out 1, 2, 3, ... so tests can predict ids.
    #[derive(Clone, Debug, Default)]
    pub struct IncrementIdGenerator(Arc<AtomicU64>);

    impl IncrementIdGenerator {
        /// Create a new [`IncrementIdGenerator`]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl IdGenerator for IncrementIdGenerator {
        fn new_trace_id(&self) -> TraceId {
            TraceId::from(u128::from(self.0.fetch_add(1, Ordering::SeqCst) + 1))
        }

        fn new_span_id(&self) -> SpanId {
            SpanId::from(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_ids_are_distinct_and_valid() {
        let generator = RandomIdGenerator::default();
        let trace_ids: HashSet<_> = (0..1_000).map(|_| generator.new_trace_id()).collect();
        let span_ids: HashSet<_> = (0..1_000).map(|_| generator.new_span_id()).collect();

        assert_eq!(trace_ids.len(), 1_000);
        assert_eq!(span_ids.len(), 1_000);
        assert!(!trace_ids.contains(&TraceId::INVALID));
        assert!(!span_ids.contains(&SpanId::INVALID));
    }

    #[test]
    fn increment_ids_are_predictable() {
        let generator = IncrementIdGenerator::new();
        assert_eq!(generator.new_trace_id(), TraceId::from(1));
        assert_eq!(generator.new_span_id(), SpanId::from(2));
        assert_eq!(generator.clone().new_span_id(), SpanId::from(3));
    }
}
