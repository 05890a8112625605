//! Poll loop: collect a snapshot, write it, sleep, repeat.
//!
//! # Usage
//!
//! ```bash
//! fleetgraph --config /etc/fleetgraph/fleetgraph.toml
//! fleetgraph --config fleetgraph.toml --once
//! ```
//!
//! Set `RUST_LOG=debug` for per-command output.

use std::env;
use std::path::PathBuf;

use fleetgraph::config::CONFIG_PATH_ENV;
use fleetgraph::{Collector, FleetConfig, JsonFileSink, SnapshotSink, SshSessionFactory};
use log::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "fleetgraph.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = FleetConfig::load(&args.config)?.with_env_overrides()?;
    info!(
        "loaded {} devices from {}, writing to {}",
        config.devices.len(),
        args.config.display(),
        config.output_path.display()
    );

    let sink = JsonFileSink::new(&config.output_path);
    let interval = config.poll_interval();
    let factory = SshSessionFactory::new(config.terminator_pattern()?);
    let collector = Collector::new(config, factory)?;

    loop {
        info!("Collecting and writing topology...");
        let report = collector.collect().await;

        if !report.parse_issues.is_empty() {
            warn!("{} output rows could not be parsed", report.parse_issues.len());
        }
        if let Err(e) = sink.persist(&report.snapshot) {
            error!("Failed to write topology: {e}");
        }

        if args.once {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    Ok(())
}

/// Command line arguments.
struct Args {
    config: PathBuf,
    once: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut once = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--once" => once = true,
                "--help" | "-h" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self { config, once }
    }

    fn print_help() {
        println!(
            r#"fleetgraph: topology snapshots over SSH CLI

USAGE:
    fleetgraph [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Config file [default: $FLEETGRAPH_CONFIG or fleetgraph.toml]
    --once                 Run a single pass and exit
    -h, --help             Print this help message

ENVIRONMENT:
    TOPOLOGY_JSON_PATH     Overrides output_path
    POLL_INTERVAL          Overrides poll_interval_secs
"#
        );
    }
}
