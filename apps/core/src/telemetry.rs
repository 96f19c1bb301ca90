//! Log and metrics output for the binary.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::str::FromStr;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppError;
use crate::nlu_metrics::{
    NluMetrics, CONFIDENCE_BUCKETS, KEYWORD_DURATION_BUCKETS, KEYWORD_PHASE_DURATION, LLM_DURATION_BUCKETS,
    LLM_PHASE_DURATION, MODEL_DURATION_BUCKETS, MODEL_PHASE_DURATION, NLU_CONFIDENCE_SCORES,
};

const DEFAULT_FILTER: &str = "caredroid_intent=info,info";
const SERVICE_NAME: &str = "caredroid-intent";

/// Log line format, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON, one object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("Unknown LOG_FORMAT '{}'", other))),
        }
    }
}

impl LogFormat {
    pub fn from_env() -> Result<Self, AppError> {
        std::env::var("LOG_FORMAT").map_or(Ok(LogFormat::Pretty), |raw| raw.parse())
    }
}

/// Installs the global tracing subscriber. Logs go to stderr.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(SERVICE_NAME.to_string(), std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| AppError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Installs the Prometheus recorder with the classifier's bucket layouts and
/// registers metric descriptions.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, AppError> {
    let buckets: [(&str, &[f64]); 4] = [
        (NLU_CONFIDENCE_SCORES, &CONFIDENCE_BUCKETS),
        (KEYWORD_PHASE_DURATION, &KEYWORD_DURATION_BUCKETS),
        (MODEL_PHASE_DURATION, &MODEL_DURATION_BUCKETS),
        (LLM_PHASE_DURATION, &LLM_DURATION_BUCKETS),
    ];

    let mut builder = PrometheusBuilder::new();
    for (metric, values) in buckets {
        builder = builder
            .set_buckets_for_metric(Matcher::Full(metric.to_string()), values)
            .map_err(|e| AppError::Config(format!("Invalid buckets for {}: {}", metric, e)))?;
    }

    let handle = builder
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;
    NluMetrics::describe();
    Ok(handle)
}
