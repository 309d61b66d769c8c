//! Tracer provider configuration.
//!
//! [`Config::default`] reads the following environment variables:
//!
//! * `HIVETRACE_TRACES_SAMPLER`: one of `always_on`, `always_off`,
//!   `traceidratio`, `parentbased_always_on`, `parentbased_always_off`,
//!   `parentbased_traceidratio`.
//! * `HIVETRACE_TRACES_SAMPLER_ARG`: the ratio for the two ratio samplers.
//! * `HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT`, `HIVETRACE_SPAN_EVENT_COUNT_LIMIT`.
//!
//! Unknown or malformed values fall back to the defaults with a warning.
use crate::trace::{IdGenerator, RandomIdGenerator, Sampler, SpanLimits};
use crate::Resource;
use hivetrace::hive_warn;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

pub(crate) const HIVETRACE_TRACES_SAMPLER: &str = "HIVETRACE_TRACES_SAMPLER";
pub(crate) const HIVETRACE_TRACES_SAMPLER_ARG: &str = "HIVETRACE_TRACES_SAMPLER_ARG";
pub(crate) const HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT: &str = "HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT";
pub(crate) const HIVETRACE_SPAN_EVENT_COUNT_LIMIT: &str = "HIVETRACE_SPAN_EVENT_COUNT_LIMIT";

/// Settings shared by every tracer of a provider.
#[derive(Debug)]
#[non_exhaustive]
pub struct Config {
    /// The sampler deciding which spans are recorded.
    pub sampler: Sampler,

    /// The id generator used for new traces and spans.
    pub id_generator: Box<dyn IdGenerator>,

    /// Per-span recording limits.
    pub span_limits: SpanLimits,

    /// The producer attached to every exported span.
    pub resource: Arc<Resource>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config {
            sampler: Sampler::ParentBased(Box::new(Sampler::AlwaysOn)),
            id_generator: Box::<RandomIdGenerator>::default(),
            span_limits: SpanLimits::default(),
            resource: Arc::new(Resource::default()),
        };

        if let Some(max_attributes_per_span) = env::var(HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT)
            .ok()
            .and_then(|count_limit| u32::from_str(&count_limit).ok())
        {
            config.span_limits.max_attributes_per_span = max_attributes_per_span;
        }

        if let Some(max_events_per_span) = env::var(HIVETRACE_SPAN_EVENT_COUNT_LIMIT)
            .ok()
            .and_then(|max_events| u32::from_str(&max_events).ok())
        {
            config.span_limits.max_events_per_span = max_events_per_span;
        }

        if let Ok(sampler) = env::var(HIVETRACE_TRACES_SAMPLER) {
            let arg = env::var(HIVETRACE_TRACES_SAMPLER_ARG).ok();
            config.sampler = sampler_from_env(&sampler, arg);
        }

        config
    }
}

fn sampler_from_env(name: &str, arg: Option<String>) -> Sampler {
    let ratio = || match arg.as_deref().and_then(|r| r.parse::<f64>().ok()) {
        Some(r) => r,
        None => {
            hive_warn!(
                name: "TracerProvider.Config.InvalidSamplerArgument",
                sampler = name,
                sampler_arg = format!("{arg:?}"),
                message = "missing or invalid sampler ratio, falling back to 1.0"
            );
            1.0
        }
    };

    match name {
        "always_on" => Sampler::AlwaysOn,
        "always_off" => Sampler::AlwaysOff,
        "traceidratio" => Sampler::TraceIdRatioBased(ratio()),
        "parentbased_always_on" => Sampler::ParentBased(Box::new(Sampler::AlwaysOn)),
        "parentbased_always_off" => Sampler::ParentBased(Box::new(Sampler::AlwaysOff)),
        "parentbased_traceidratio" => {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio())))
        }
        other => {
            hive_warn!(
                name: "TracerProvider.Config.InvalidSamplerType",
                sampler = other,
                message = "unrecognized sampler, falling back to parentbased_always_on"
            );
            Sampler::ParentBased(Box::new(Sampler::AlwaysOn))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("always_on", None, Sampler::AlwaysOn)]
    #[case("always_off", None, Sampler::AlwaysOff)]
    #[case("traceidratio", Some("0.5"), Sampler::TraceIdRatioBased(0.5))]
    #[case("traceidratio", Some("half"), Sampler::TraceIdRatioBased(1.0))]
    #[case(
        "parentbased_traceidratio",
        Some("0.1"),
        Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(0.1)))
    )]
    #[case(
        "parentbased_always_off",
        None,
        Sampler::ParentBased(Box::new(Sampler::AlwaysOff))
    )]
    #[case("jaeger_remote", None, Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))]
    fn sampler_env(
        #[case] sampler: &str,
        #[case] arg: Option<&str>,
        #[case] expected: Sampler,
    ) {
        temp_env::with_vars(
            [
                (HIVETRACE_TRACES_SAMPLER, Some(sampler)),
                (HIVETRACE_TRACES_SAMPLER_ARG, arg),
            ],
            || {
                assert_eq!(Config::default().sampler, expected);
            },
        );
    }

    #[test]
    fn span_limits_env() {
        temp_env::with_vars(
            [
                (HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT, Some("4")),
                (HIVETRACE_SPAN_EVENT_COUNT_LIMIT, Some("not-a-number")),
            ],
            || {
                let config = Config::default();
                assert_eq!(config.span_limits.max_attributes_per_span, 4);
                assert_eq!(
                    config.span_limits.max_events_per_span,
                    SpanLimits::default().max_events_per_span
                );
            },
        );
    }

    #[test]
    fn defaults_without_env() {
        temp_env::with_vars_unset(
            [
                HIVETRACE_TRACES_SAMPLER,
                HIVETRACE_SPAN_ATTRIBUTE_COUNT_LIMIT,
                HIVETRACE_SPAN_EVENT_COUNT_LIMIT,
            ],
            || {
                let config = Config::default();
                assert_eq!(config.sampler, Sampler::ParentBased(Box::new(Sampler::AlwaysOn)));
                assert_eq!(config.span_limits, SpanLimits::default());
            },
        );
    }
}
