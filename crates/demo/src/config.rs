//! Demo configuration loaded from environment variables.

use common::AggregateId;
use dispatch::DEFAULT_CAPACITY;

/// Demo configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `KERNEL_LOG_FORMAT`: `json` for JSON log lines, anything else for text
/// - `KERNEL_AGGREGATE_ID`: identity of the demo tally (default: random UUID)
/// - `KERNEL_QUEUE_CAPACITY`: command queue capacity (default: `1024`)
/// - `KERNEL_PRINT_METRICS`: `true` to print a Prometheus snapshot at exit
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_json: bool,
    pub aggregate_id: AggregateId,
    pub queue_capacity: usize,
    pub print_metrics: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: std::env::var("KERNEL_LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.log_json),
            aggregate_id: std::env::var("KERNEL_AGGREGATE_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .map(AggregateId::from)
                .unwrap_or(defaults.aggregate_id),
            queue_capacity: std::env::var("KERNEL_QUEUE_CAPACITY")
                .ok()
                .and_then(|capacity| capacity.parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.queue_capacity),
            print_metrics: std::env::var("KERNEL_PRINT_METRICS")
                .ok()
                .and_then(|flag| flag.parse().ok())
                .unwrap_or(defaults.print_metrics),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            aggregate_id: AggregateId::new(),
            queue_capacity: DEFAULT_CAPACITY,
            print_metrics: false,
        }
    }
}
