//! Observability module for tracing setup, spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable levels and output format
//! - Span helpers for OCR and extraction work
//! - Metric recording helpers
//!
//! Metrics go through the `metrics` facade; they are no-ops until the embedding
//! application installs a recorder.

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Targets this crate logs under.
const CRATE_TARGETS: [&str; 2] = ["careguide_scan", "ocr_preprocessing"];

/// Initialize structured logging with tracing and configuration
///
/// The configured level applies to this crate's targets unless `RUST_LOG` names them
/// itself; every other `RUST_LOG` directive is kept as given.
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let filter = build_filter(&rust_log, &config.log_level)?;

    // Initialize based on environment (pretty for development, JSON for others)
    match config.effective_log_format() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// `RUST_LOG` directives plus `<target>=<level>` for each crate target `RUST_LOG` leaves out.
fn build_filter(rust_log: &str, level: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder().parse_lossy(rust_log);
    for target in CRATE_TARGETS {
        if !mentions_target(rust_log, target) {
            filter = filter.add_directive(format!("{}={}", target, level).parse()?);
        }
    }
    Ok(filter)
}

fn mentions_target(rust_log: &str, target: &str) -> bool {
    rust_log.split(',').any(|directive| {
        let name = directive
            .split(['=', '['])
            .next()
            .unwrap_or_default()
            .trim();
        name == target || name.starts_with(&format!("{}::", target))
    })
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for medicine extraction
pub fn extraction_span(text_length: usize) -> tracing::Span {
    tracing::info_span!(
        "medicine_extraction",
        text_length = text_length,
        component = "extraction"
    )
}

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: std::time::Duration) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
}

/// Record how long image conditioning took
pub fn record_conditioning_metrics(duration: std::time::Duration) {
    metrics::histogram!("conditioning_duration_seconds").record(duration.as_secs_f64());
}

/// Record the number of medicines found by one extraction
pub fn record_extraction_metrics(medicine_count: usize) {
    metrics::counter!("extractions_total").increment(1);
    metrics::counter!("medicines_detected_total").increment(medicine_count as u64);
}
