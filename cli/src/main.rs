//! Scopekeeper CLI - drive a configured registry chain from the command line.
//!
//! ```text
//! main() -> ScopekeeperConfig -> RegistryConfig::build() -> Registry chain
//!                    |
//!                    +-> loggers() -> FanoutLogger (+ MailWorker)
//!                                          |
//!                                          v
//!                        simulate::run() on blocking threads
//! ```
//!
//! `scopekeeper chain` prints the resolved fallback chain.
//! `scopekeeper simulate` runs concurrent requests and background jobs.

mod simulate;

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scopekeeper_config::ScopekeeperConfig;
use scopekeeper_log::TracingTransport;

use crate::simulate::{SimulationOptions, SimulationReport};

const USAGE: &str = "\
usage: scopekeeper [chain | simulate] [options]

options:
  --config PATH      read configuration from PATH
  --requests N       concurrent requests to simulate (default 4)
  --background N     background jobs to simulate (default 1)
  --depth N          nested operations per context (default 3)
  --fail-every N     fail the outermost commit of every Nth request";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Chain,
    Simulate,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    command: Command,
    config: Option<PathBuf>,
    simulation: SimulationOptions,
}

impl Options {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter().peekable();
        let command = match args.peek().map(String::as_str) {
            Some("chain") => Command::Chain,
            Some("simulate") => Command::Simulate,
            Some("help") => Command::Help,
            Some(other) if !other.starts_with('-') => {
                bail!("unknown command '{other}'\n\n{USAGE}")
            }
            _ => Command::Simulate,
        };
        if matches!(args.peek().map(String::as_str), Some(s) if !s.starts_with('-')) {
            args.next();
        }

        let mut options = Self {
            command,
            config: None,
            simulation: SimulationOptions::default(),
        };
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("{flag} requires a value"))
            };
            match flag.as_str() {
                "--config" => options.config = Some(PathBuf::from(value()?)),
                "--requests" => options.simulation.requests = parse_count(&flag, &value()?)?,
                "--background" => options.simulation.background = parse_count(&flag, &value()?)?,
                "--depth" => options.simulation.depth = parse_count(&flag, &value()?)?,
                "--fail-every" => options.simulation.fail_every = parse_count(&flag, &value()?)?,
                "--help" | "-h" => options.command = Command::Help,
                other => bail!("unknown argument '{other}'\n\n{USAGE}"),
            }
        }
        Ok(options)
    }
}

fn parse_count(flag: &str, raw: &str) -> Result<usize> {
    raw.parse()
        .with_context(|| format!("{flag} expects a non-negative integer, got '{raw}'"))
}

fn init_tracing(configured: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScopekeeperConfig> {
    let loaded = match path {
        Some(path) => ScopekeeperConfig::load_from(path)?
            .with_context(|| format!("config file {} does not exist", path.display()))?,
        None => ScopekeeperConfig::load()?.unwrap_or_default(),
    };
    Ok(loaded)
}

fn print_report(report: &SimulationReport) {
    for ctx in &report.contexts {
        let status = ctx.error.as_deref().unwrap_or("ok");
        println!(
            "{:<12} via {:<18} commits [{}] {status}",
            ctx.context,
            ctx.resolved_by,
            ctx.commits.join(", ")
        );
    }
    println!(
        "{} contexts, {} commits, {} failures",
        report.contexts.len(),
        report.total_commits(),
        report.failures()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse(env::args().skip(1))?;
    if options.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = load_config(options.config.as_deref())?;
    init_tracing(config.log_filter());

    let registry = config
        .registry()
        .build()
        .context("invalid registry chain")?;

    if options.command == Command::Chain {
        for (name, adapter) in registry.chain() {
            println!("{name}\t{adapter}");
        }
        return Ok(());
    }

    let (logger, mail_worker) = config.loggers(Arc::new(TracingTransport));
    let simulation = options.simulation;
    tracing::info!(
        requests = simulation.requests,
        background = simulation.background,
        depth = simulation.depth,
        "Starting simulation"
    );
    let report =
        tokio::task::spawn_blocking(move || simulate::run(&registry, &logger, &simulation))
            .await
            .context("simulation task failed")??;
    print_report(&report);

    if let Some(worker) = mail_worker {
        let delivered = worker.finish().await;
        tracing::info!(delivered, "Mail sink drained");
    }
    Ok(())
}
