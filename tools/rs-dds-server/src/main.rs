// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RealSense DDS Server CLI
//!
//! # Usage
//!
//! ```bash
//! # Bridge the configured devices on domain 0
//! rs-dds-server
//!
//! # Other domain, debug logging
//! rs-dds-server --domain 42 --debug
//!
//! # Using configuration file, no default stream
//! rs-dds-server --config rs-dds-server.toml --no-auto-start
//!
//! # Write an example configuration
//! rs-dds-server gen-config -o rs-dds-server.toml
//! ```

use clap::{Parser, Subcommand};
use realdds::{HddsTransport, Participant, MAX_DOMAIN_ID};
use rs_dds_server::{Bridge, ServerConfig, SimContext, StreamReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// RealSense DDS Server
#[derive(Parser, Debug)]
#[command(name = "rs-dds-server")]
#[command(about = "RealSense DDS Server - Bridge camera devices to DDS")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// DDS domain ID [0-232]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_DOMAIN_ID)))]
    domain: Option<u32>,

    /// Enable debug logging (same as --log-level debug)
    #[arg(long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Do not start the default stream of newly bridged devices
    #[arg(long)]
    no_auto_start: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "rs-dds-server.toml")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(Commands::GenConfig { output }) = &args.command {
        init_logging("info");
        return match cmd_gen_config(output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// File values, overridden by the command line.
fn build_config(args: &Args) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    if let Some(domain) = args.domain {
        config.domain = domain;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if args.debug {
        config.log_level = "debug".into();
    }
    if args.no_auto_start {
        config.auto_start = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let transport = HddsTransport::new(&config.participant_name, config.domain)?;
    let participant = Arc::new(
        Participant::builder(&config.participant_name)
            .with_transport(Arc::new(transport))
            .build()?,
    );
    let context = Arc::new(SimContext::from_config(&config.simulated_devices));

    info!("RealSense DDS Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Domain: {} (UDP multicast)", config.domain);
    info!("Simulated devices: {}", config.simulated_devices.len());

    let mut bridge = Bridge::start(participant, context, &config)?;
    info!("Bridge running. Press Ctrl+C to stop.");

    let result = bridge.run(&running);
    if result.is_ok() {
        info!("Shutting down...");
    }

    let reports = bridge.stream_reports();
    if !reports.is_empty() {
        info!("Final statistics:");
        print_stats(&reports);
    }
    bridge.shutdown();

    result?;
    Ok(())
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = ServerConfig::default().to_toml()?;

    let content = format!(
        r#"# RealSense DDS Server Configuration
# Generated by rs-dds-server gen-config

{}
"#,
        toml_str
    );

    std::fs::write(output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn print_stats(reports: &[StreamReport]) {
    for report in reports {
        info!(
            "  {} {}/{}: {} frames ({:.1} fps), {}, {} dropped",
            report.device,
            report.topic_root,
            report.stream,
            report.stats.frames_published,
            report.stats.frames_per_second(),
            format_bytes(report.stats.bytes_published),
            report.stats.frames_dropped
        );
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_out_of_range() {
        assert!(Args::try_parse_from(["rs-dds-server", "-d", "233"]).is_err());
        let args = Args::try_parse_from(["rs-dds-server", "-d", "232"]).expect("parse");
        assert_eq!(args.domain, Some(232));
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "rs-dds-server",
            "--domain",
            "7",
            "--debug",
            "--no-auto-start",
        ])
        .expect("parse");
        let config = build_config(&args).expect("config");
        assert_eq!(config.domain, 7);
        assert_eq!(config.log_level, "debug");
        assert!(!config.auto_start);
    }

    #[test]
    fn test_gen_config_subcommand() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("server.toml");
        cmd_gen_config(&output).expect("gen");
        let config = ServerConfig::from_file(&output).expect("reload");
        assert_eq!(config.participant_name, "rs-dds-server");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
