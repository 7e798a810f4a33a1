//! This module implements the CLI interface for dirpub: command parsing, the
//! `publish` and `inspect` entrypoints, and user-visible output.
//!
//! All pipeline logic (parsing, polling, publishing) lives in the library
//! modules; this module is CLI glue only.
//!
//! ## How To Use
//! - For command-line users: run the `dirpub` binary with `--help`.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::bridge;
use crate::content;
use crate::contract::Publisher;
use crate::load_config::load_config;
use crate::publish::KafkaPublisher;
use crate::signal;

/// CLI for dirpub: publish files dropped in a directory to Kafka.
#[derive(Parser)]
#[clap(
    name = "dirpub",
    version,
    about = "Poll a directory and publish each file as a Kafka message"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the configured directory and publish its files to the topic
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Poll the directory once and exit
        #[clap(long)]
        run_once: bool,
        /// Keep files on disk after they have been published
        #[clap(long)]
        no_delete_files: bool,
    },
    /// Show the key, headers and body a drop file would be published with
    Inspect {
        /// The drop file to parse
        file: PathBuf,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish {
            config,
            run_once,
            no_delete_files,
        } => publish(config, run_once, no_delete_files).await,
        Commands::Inspect { file } => inspect(file),
    }
}

async fn publish(config: PathBuf, run_once: bool, no_delete_files: bool) -> Result<()> {
    let mut config = load_config(config)?;
    if run_once {
        config.source.run_once = true;
    }
    if no_delete_files {
        config.source.delete_files = false;
    }

    let options = config.options();
    // configuration problems are fatal before any client is created
    bridge::validate(&options).context("Invalid configuration")?;

    let publisher = KafkaPublisher::new(&config.kafka).context("Failed to create Kafka producer")?;

    let shutdown = CancellationToken::new();
    let signal_task = signal::cancel_on_signal(shutdown.clone());

    tracing::info!(command = "publish", "Starting publish loop");
    let result = bridge::run(&options, &publisher, shutdown).await;
    signal_task.abort();

    if let Err(e) = publisher.close().await {
        tracing::error!(error = %e, "Error closing producer on shutdown");
    }

    match result {
        Ok(report) => {
            tracing::info!(command = "publish", ?report, "Publish loop complete");
            println!("Publish complete.\nReport:");
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "publish", error = %e, "Publish loop failed");
            if let Some(report) = e.report() {
                println!("Publish stopped early.\nReport:");
                println!("{}", serde_json::to_string_pretty(report)?);
            }
            Err(anyhow::Error::new(e).context(format!(
                "Failed to process messages from {}",
                options.directory.display()
            )))
        }
    }
}

fn inspect(file: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let Some(parts) = content::parse(&text)? else {
        println!("No content to publish.");
        return Ok(());
    };

    println!("key: {}", parts.key.as_deref().unwrap_or("<none>"));
    match &parts.headers {
        Some(headers) => {
            println!("headers:");
            for header in headers {
                println!("  {}: {}", header.name, header.value_lossy());
            }
        }
        None => println!("headers: <none>"),
    }
    println!("body:\n{}", parts.body);
    Ok(())
}
