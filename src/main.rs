mod config;
mod hosts;
mod metrics;
mod orchestrator;
mod probe;
mod progress;
mod report;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Configuration;
use crate::metrics::Summary;
use crate::orchestrator::{Orchestrator, RunOutcome};

/// CLI utility for checking the availability of HTTP servers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with hosts, one URL per line
    #[arg(short = 'F', long)]
    file: Option<PathBuf>,
    /// Hosts, divided using ","
    #[arg(short = 'H', long)]
    hosts: Option<String>,
    /// Amount of requests per host [default: 1]
    #[arg(short = 'C', long)]
    count: Option<usize>,
    /// Output file with results (HTML, or JSON for a .json file name)
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,
    /// Config file [default: httprobe.yaml]
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log every single probe
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    /// Also write logs to a timestamped file (in the current directory unless configured)
    #[arg(long, default_value_t = false)]
    log_file: bool,
    /// Log as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

/// Flags given on the command line win over the configuration file.
fn load_configuration(args: &Args) -> anyhow::Result<Configuration> {
    let config_file = args
        .config
        .clone()
        .unwrap_or(PathBuf::from("httprobe.yaml"));
    let mut conf = Configuration::load(&config_file)?;

    if let Some(file) = &args.file {
        conf.hosts_file = Some(file.clone());
    }
    if let Some(list) = &args.hosts {
        conf.hosts = hosts::split_list(list);
    }
    if let Some(count) = args.count {
        conf.count = count;
    }
    if let Some(output) = &args.output {
        conf.output = Some(output.clone());
    }
    if args.log_file && conf.log_dir.is_none() {
        conf.log_dir = Some(PathBuf::from("."));
    }
    Ok(conf)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let conf = match load_configuration(&args) {
        Ok(conf) => conf,
        Err(e) => {
            init_tracing(args.verbose, args.json_logs, None);
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(args.verbose, args.json_logs, conf.log_dir.as_deref());

    match run(conf).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(conf: Configuration) -> anyhow::Result<ExitCode> {
    let targets = hosts::resolve_hosts(&conf)?;
    let orchestrator = Orchestrator::new(targets, conf.count)?
        .with_timeout(conf.timeout())
        .with_progress_interval(conf.progress_interval());
    info!("initialization");

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_sender.send(true);
            }
            Err(e) => warn!("cannot listen for Ctrl-C: {e}"),
        }
    });

    match orchestrator.run(shutdown_receiver).await? {
        RunOutcome::Completed(summary) => {
            report::print_console(&summary).context("error printing results")?;
            if let Some(output) = &conf.output {
                report::write_report(output, conf.template.as_deref(), &summary)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Interrupted(partial) => {
            let recorded: usize = partial.values().map(Summary::total).sum();
            info!(recorded, "Force shutdown by user ...");
            Ok(ExitCode::from(130))
        }
    }
}

fn open_log_file(log_dir: &Path) -> anyhow::Result<File> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("error creating log directory {}", log_dir.display()))?;
    let name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let path = log_dir.join(name);
    File::create(&path).with_context(|| format!("error creating log file {}", path.display()))
}

fn env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={level},warn", env!("CARGO_CRATE_NAME"))))
}

fn init_tracing(verbose: bool, json: bool, log_dir: Option<&Path>) {
    let mut layers = Vec::new();
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let console = if json {
        console.json().with_filter(env_filter(verbose)).boxed()
    } else {
        console.with_filter(env_filter(verbose)).boxed()
    };
    layers.push(console);

    let log_file = log_dir.map(open_log_file).transpose();
    let mut log_file_error = None;
    match log_file {
        Ok(Some(file)) => {
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter(verbose))
                .boxed();
            layers.push(file_layer);
        }
        Ok(None) => {}
        Err(e) => log_file_error = Some(e),
    }

    tracing_subscriber::registry().with(layers).init();

    if let Some(e) = log_file_error {
        warn!("logging to console only: {e:#}");
    }
}
