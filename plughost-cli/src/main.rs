//! plughost command-line tool
//!
//! Resolves plugin packages the way the runtime would and prints what each
//! one turned into, without running any plugin code.
//!
//! Usage:
//!   plughost check ./plugins/calendar ./plugins/notes
//!   plughost --dot-root /tmp/plughost check --json ./plugins/*

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plughost_cli::{Report, check};
use plughost_core::CoreConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "plughost")]
#[command(about = "Inspect plughost plugin packages")]
struct Args {
    /// Config file (defaults to ~/.plughost/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the dot directory settings and preferences live in
    #[arg(long)]
    dot_root: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register packages with an offline sandbox and report the result
    Check {
        /// Package roots (directories holding package.json)
        #[arg(required = true)]
        packages: Vec<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => CoreConfig::load_from(path),
        None => CoreConfig::load(),
    };
    if let Some(dot_root) = args.dot_root {
        config.dot_root = dot_root;
    }
    debug!(dot_root = %config.dot_root.display(), "configuration loaded");

    match args.command {
        Command::Check { packages, json } => {
            let packages = packages
                .into_iter()
                .map(|p| std::path::absolute(&p).with_context(|| format!("resolving {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let report = check(config, &packages).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn print_report(report: &Report) {
    println!("{:<28} {:<10} {:<8} ORIGIN", "ID", "STATUS", "THEMES");
    for plugin in &report.plugins {
        println!(
            "{:<28} {:<10} {:<8} {}",
            plugin.id,
            plugin.status.as_str(),
            plugin.themes,
            plugin.origin
        );
        if let Some(entry) = &plugin.entry {
            println!("    entry: {entry}");
        }
        if let Some(error) = &plugin.error {
            println!("    error: {error}");
        }
    }
    if !report.rejected.is_empty() {
        println!("\nRejected:");
        for rejection in &report.rejected {
            println!("  {} ({:?}): {}", rejection.origin, rejection.kind, rejection.message);
        }
    }
}
