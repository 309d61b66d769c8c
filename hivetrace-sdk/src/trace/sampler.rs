//! Head sampling: deciding at span start whether a span is recorded.
use hivetrace::trace::{SpanContext, TraceId};

/// The outcome of a sampling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingDecision {
    /// The span is not recorded. It still gets a valid span context so that
    /// the unsampled decision propagates downstream.
    Drop,
    /// The span is recorded and marked sampled.
    RecordAndSample,
}

/// Built-in samplers.
///
/// The provider default is `ParentBased(AlwaysOn)`: follow the caller's
/// decision when there is a parent, sample every new trace otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Sampler {
    /// Always sample the trace
    AlwaysOn,
    /// Never sample the trace
    AlwaysOff,
    /// Respects the parent span's sampling decision or delegates a delegate sampler for root spans.
    ParentBased(Box<Sampler>),
    /// Sample a given fraction of traces. Fractions >= 1 will always sample.
    /// If the parent span is sampled, then it's child spans will automatically
    /// be sampled. Fractions < 0 are treated as zero, but spans may still be
    /// sampled if their parent is.
    TraceIdRatioBased(f64),
}

impl Sampler {
    /// Decide whether the span about to start with `trace_id` is sampled.
    ///
    /// `parent` is the span context of the enclosing span, if any.
    pub fn should_sample(
        &self,
        parent: Option<&SpanContext>,
        trace_id: TraceId,
    ) -> SamplingDecision {
        match self {
            Sampler::AlwaysOn => SamplingDecision::RecordAndSample,
            Sampler::AlwaysOff => SamplingDecision::Drop,
            Sampler::ParentBased(delegate) => match parent.filter(|sc| sc.is_valid()) {
                Some(sc) if sc.is_sampled() => SamplingDecision::RecordAndSample,
                Some(_) => SamplingDecision::Drop,
                None => delegate.should_sample(None, trace_id),
            },
            Sampler::TraceIdRatioBased(prob) => sample_based_on_probability(*prob, trace_id),
        }
    }
}

fn sample_based_on_probability(prob: f64, trace_id: TraceId) -> SamplingDecision {
    if prob >= 1.0 {
        return SamplingDecision::RecordAndSample;
    }

    let prob_upper_bound = (prob.max(0.0) * (1u64 << 63) as f64) as u64;
    let trace_id_low = u128::from_be_bytes(trace_id.to_bytes()) as u64;
    if trace_id_low >> 1 < prob_upper_bound {
        SamplingDecision::RecordAndSample
    } else {
        SamplingDecision::Drop
    }
}
