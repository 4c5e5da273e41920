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

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "rostra_cache_hit_total",
            Unit::Count,
            "Reads answered from the cache, labelled by key kind."
        );
        describe_counter!(
            "rostra_cache_miss_total",
            Unit::Count,
            "Reads that fell through to the repositories, labelled by key kind."
        );
        describe_counter!(
            "rostra_cache_fault_total",
            Unit::Count,
            "Cache backend errors swallowed on the request path."
        );
        describe_counter!(
            "rostra_cache_evict_total",
            Unit::Count,
            "Entries evicted from the in-process store due to capacity."
        );
        describe_counter!(
            "rostra_cache_invalidated_keys_total",
            Unit::Count,
            "Keys deleted by invalidation plans."
        );
        describe_histogram!(
            "rostra_cache_invalidate_ms",
            Unit::Milliseconds,
            "Latency of executing one invalidation plan in milliseconds."
        );
        describe_counter!(
            "rostra_lending_cas_retry_total",
            Unit::Count,
            "Book writes retried after a version conflict."
        );
        describe_counter!(
            "rostra_lending_compensation_total",
            Unit::Count,
            "Book writes reverted because the student write failed."
        );
        describe_counter!(
            "rostra_write_rollback_total",
            Unit::Count,
            "Multi-record writes unwound after a follow-up step failed, labelled by operation."
        );
    });
}
