use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Counters emitted by the cache decorator and the fan-out engine.
const COUNTERS: &[(&str, &str)] = &[
    (
        "microblog_cache_hit_total",
        "Single-post reads answered from the post cache.",
    ),
    (
        "microblog_cache_miss_total",
        "Single-post reads that fell through to the post store.",
    ),
    (
        "microblog_cache_error_total",
        "Post cache operations that failed and were ignored.",
    ),
    (
        "microblog_fanout_entries_total",
        "Feed entries written or refreshed by fan-out.",
    ),
    (
        "microblog_fanout_failures_total",
        "Feed writes that fan-out gave up on.",
    ),
];

/// Log records go to stdout; `RUST_LOG` overrides the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for &(name, description) in COUNTERS {
            describe_counter!(name, Unit::Count, description);
        }
        describe_histogram!(
            "microblog_fanout_ms",
            Unit::Milliseconds,
            "Duration of one fan-out pass (publish, backfill or edit)."
        );
    });
}
