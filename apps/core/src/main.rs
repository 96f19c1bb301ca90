// CareDroid intent classifier CLI
// Classifies each message and prints one JSON document per line.

use anyhow::{bail, Context, Result};
use caredroid_intent::brain::{ClassificationContext, IntentClassifier};
use caredroid_intent::config::ClassifierConfig;
use caredroid_intent::nlu_metrics::NluMetrics;
use caredroid_intent::preflight::run_preflight_checks;
use caredroid_intent::telemetry::{init_tracing, install_prometheus_recorder, LogFormat};
use clap::Parser;
use futures::future::join_all;
use std::io::BufRead;
use std::sync::Arc;
use tracing::info;

const CLI_USER_ID: &str = "cli";

/// Classify clinical chat messages.
#[derive(Parser, Debug)]
#[command(name = "caredroid-intent", about = "Classify clinical chat messages", version)]
struct Cli {
    /// Include escalation guidance with each classification.
    #[arg(long)]
    guidance: bool,

    /// Print the Prometheus metrics rendering before exiting.
    #[arg(long)]
    metrics: bool,

    /// User role for threshold resolution (e.g. clinician).
    #[arg(long)]
    role: Option<String>,

    /// Messages to classify. Lines from stdin are used when none are given.
    messages: Vec<String>,
}

fn read_stdin_messages() -> Result<Vec<String>> {
    let mut messages = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if !line.trim().is_empty() {
            messages.push(line);
        }
    }
    Ok(messages)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    init_tracing(LogFormat::from_env()?)?;
    let prometheus = install_prometheus_recorder()?;
    let config = ClassifierConfig::from_env().context("Invalid classifier configuration")?;

    let report = run_preflight_checks(&config).await;
    if !report.ready_to_start {
        bail!("Preflight failed: {}", report.summary);
    }

    let classifier = IntentClassifier::from_config(config, Arc::new(NluMetrics::new()))?;

    let messages = if cli.messages.is_empty() {
        read_stdin_messages()?
    } else {
        cli.messages.clone()
    };
    info!("Classifying {} message(s)", messages.len());

    let mut context = ClassificationContext::new(CLI_USER_ID);
    if let Some(role) = &cli.role {
        context = context.with_role(role.clone());
    }

    let guidance = cli.guidance;
    let outputs = join_all(messages.iter().map(|message| {
        let classifier = &classifier;
        let context = &context;
        async move {
            if guidance {
                serde_json::to_string(&classifier.classify_with_guidance(message, Some(context)).await)
            } else {
                serde_json::to_string(&classifier.classify(message, Some(context)).await)
            }
        }
    }))
    .await;

    for output in outputs {
        println!("{}", output?);
    }

    if cli.metrics {
        print!("{}", prometheus.render());
    }
    Ok(())
}
