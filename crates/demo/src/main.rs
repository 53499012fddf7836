//! Demo entry point.
//!
//! Usage: `demo [STEP]...` where each step is `n`, `a,b,c`, `none` or
//! `close`. Without steps a built-in script runs. The run report is
//! printed as JSON.

use demo::{Config, DEFAULT_SCRIPT, DemoError};

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    demo::init_tracing(&config)?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = if config.print_metrics {
        Some(metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    // 3. Run the script
    let args: Vec<String> = std::env::args().skip(1).collect();
    let report = if args.is_empty() {
        demo::run(&config, DEFAULT_SCRIPT).await?
    } else {
        demo::run(&config, &args).await?
    };

    tracing::info!(
        committed = report.committed(),
        rejected = report.rejected(),
        replay_matches = report.replay_matches,
        "script finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    // 4. Print the metrics snapshot
    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    Ok(())
}
