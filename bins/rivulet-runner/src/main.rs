mod config;
mod error;
mod records;
mod run;

use std::io::BufReader;
use std::time::Duration;

use clap::Parser;
use rivulet_api::{FlowProcessor, MemorySession};
use rivulet_plugin_host::PluginFlowProcessor;

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::run::{RunLimits, run_processor};

#[derive(Parser)]
#[command(name = "rivulet-runner", about = "Run a processor plugin over NDJSON records")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "runner.toml", env = "RIVULET_CONFIG")]
    config: String,

    /// NDJSON input file. Overrides `input` from the configuration.
    #[arg(long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config, "loading configuration");
    let config = match RunnerConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, cli.input).await {
        tracing::error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

async fn run(config: RunnerConfig, input_override: Option<String>) -> Result<(), RunnerError> {
    let proc_cfg = &config.processor;
    let processor = PluginFlowProcessor::load(&proc_cfg.plugin, &proc_cfg.config_json()?)
        .map_err(|e| e.with_context(&proc_cfg.name))?;
    for (name, value) in proc_cfg.dynamic_properties()? {
        processor
            .on_dynamic_property(&name, Some(&value))
            .map_err(|e| e.with_context(format!("{}: dynamic property '{name}'", proc_cfg.name)))?;
    }
    let outputs: Vec<String> = processor
        .relationships()
        .iter()
        .map(|rel| rel.name().to_string())
        .collect();
    tracing::info!(processor = %proc_cfg.name, plugin = %proc_cfg.plugin, ?outputs, "processor ready");

    let records = match input_override.or_else(|| config.input.clone()) {
        Some(path) => {
            let file = std::fs::File::open(&path)
                .map_err(|source| RunnerError::Io { path: path.clone(), source })?;
            records::read_records(BufReader::new(file))?
        }
        None => records::read_records(std::io::stdin().lock())?,
    };

    let mut session = MemorySession::new();
    let total = records.len();
    for record in records {
        session.enqueue(record);
    }
    tracing::info!(processor = %proc_cfg.name, records = total, "records queued");

    let limits = RunLimits {
        max_triggers: config.max_triggers,
        yield_period: Duration::from_millis(config.yield_ms),
    };
    let summary = run_processor(&proc_cfg.name, &processor, &mut session, limits).await;

    let routed = session.drain_routed();
    records::write_routed(std::io::stdout().lock(), &routed)?;
    tracing::info!(
        processor = %proc_cfg.name,
        triggers = summary.triggers,
        yields = summary.yields,
        failed_triggers = summary.failed_triggers,
        removed = summary.removed,
        routed = ?summary.routed,
        remaining = session.queue_len(),
        "run complete"
    );
    Ok(())
}
