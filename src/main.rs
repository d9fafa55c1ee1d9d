//! `inference-filter` command line.
//!
//! - `check-config`: load, validate and print the resolved mode gate
//! - `replay`: run a JSON-lines script of phase events through the pipeline
//!   and print every response and metric emission as JSON

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use inference_filter::cache::InMemoryResponseCache;
use inference_filter::config::{load_config, FilterConfig};
use inference_filter::gate::ModeGate;
use inference_filter::observability::{
    init_logging, init_metrics, FanoutMetrics, MemoryMetrics, MetricsSink, PrometheusMetrics,
};
use inference_filter::pipeline::{PhaseEvent, Processor, Session};

#[derive(Parser)]
#[command(name = "inference-filter")]
#[command(about = "Identity-aware inference request filter", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the resolved gate
    CheckConfig,
    /// Replay phase events; blank lines separate requests
    Replay {
        script: PathBuf,
        /// Keep the metrics endpoint up for this many seconds afterwards
        #[arg(long, default_value_t = 0)]
        linger_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FilterConfig::default(),
    };
    init_logging(&config.observability)?;

    match cli.command {
        Commands::CheckConfig => {
            let gate = ModeGate::from_config(&config);
            println!("{}", serde_json::to_string_pretty(&gate_summary(&gate))?);
        }
        Commands::Replay { script, linger_secs } => {
            replay(&config, &script).await?;
            if config.observability.metrics_enabled && linger_secs > 0 {
                tracing::info!(linger_secs, "Holding metrics endpoint open");
                tokio::time::sleep(Duration::from_secs(linger_secs)).await;
            }
        }
    }

    Ok(())
}

async fn replay(config: &FilterConfig, script: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let recorded = Arc::new(MemoryMetrics::new());
    let mut sinks: Vec<Arc<dyn MetricsSink>> = vec![recorded.clone()];
    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
        sinks.push(Arc::new(PrometheusMetrics));
    }

    let processor = Processor::new(
        ModeGate::from_config(config),
        Arc::new(FanoutMetrics::new(sinks)),
    )
    .with_cache(Arc::new(InMemoryResponseCache::new()));

    let content = fs::read_to_string(script)?;
    let mut session: Option<Session> = None;
    let mut requests = 0usize;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(done) = session.take() {
                done.finish().await?;
            }
            continue;
        }
        let event: PhaseEvent = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {e}", script.display(), index + 1))?;

        if session.is_none() {
            requests += 1;
        }
        let active = session.get_or_insert_with(|| Session::spawn(&processor, 8));
        match active.process(event).await {
            Some(response) => {
                println!("{}", json!({ "request": requests, "response": response }));
            }
            None => tracing::warn!(
                line = index + 1,
                request = requests,
                "Request already completed, event ignored"
            ),
        }
    }
    if let Some(done) = session.take() {
        done.finish().await?;
    }

    for event in recorded.take() {
        println!("{}", serde_json::to_string(&event)?);
    }
    tracing::info!(requests, "Replay complete");
    Ok(())
}

fn gate_summary(gate: &ModeGate) -> serde_json::Value {
    json!({
        "identity_mode": gate.identity_mode(),
        "cost_policy": format!("{:?}", gate.cost_policy()),
        "export": {
            "token_metrics": gate.export_token_metrics(),
            "cache_metrics": gate.export_cache_metrics(),
            "routing_metrics": gate.export_routing_metrics(),
            "security_metrics": gate.export_security_metrics(),
            "routing_headers": gate.export_routing_headers(),
            "cache_headers": gate.export_cache_headers(),
            "security_headers": gate.export_security_headers(),
        },
        "headers": {
            "prefix": gate.header_prefix(),
            "user": gate.user_header(),
            "tier": gate.tier_header(),
        },
        "fallback": {
            "user": gate.fallback_user(),
            "tier": gate.fallback_tier(),
        },
    })
}
