mod config;
mod error;
mod metrics;
mod prober;
mod report;
mod scheduler;
mod timestamp;
mod util;

use config::{Cli, LogFormat, ProbeConfig};
use error::{ProbeError, EXIT_BADARGS, EXIT_SUCCESS};
use prober::{run_probe_cycle, Target};
use report::{format_banner, ConsoleObserver, DisplayOptions, StatusReporter};
use scheduler::Scheduler;

use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long a Ctrl-C waits for clients to finish the cycle they are in.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_BADARGS } else { EXIT_SUCCESS });
        }
    };
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n * {e:#}\n");
            return ExitCode::from(EXIT_BADARGS);
        }
    };

    // Init tracing with configured log level
    if let Err(e) = init_tracing(&config) {
        eprintln!("Setting up logging: {e:#}");
        return ExitCode::from(EXIT_BADARGS);
    }

    match run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(config: &ProbeConfig) -> anyhow::Result<()> {
    let log_level = config.get_tracing_level()?;
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("httpbox={}", log_level.as_str().to_lowercase()).parse()?);
    // stdout belongs to the report
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Start-up failures come back as errors. Once clients are running the
/// result is the exit code they leave behind.
async fn run(config: ProbeConfig) -> Result<u8, ProbeError> {
    let target = util::parse_target(&config.url)?;
    let ip = util::resolve_host_to_ip(&target.host).await?;
    info!("probing {}://{}:{}{} at {}", target.scheme, target.host, target.port, target.path, ip);

    let target = match &config.host {
        Some(host) => target.with_host(host),
        None => target,
    };

    if !config.silent {
        println!("{}", format_banner(&target, ip, &config));
    }

    if let Some(addr) = config.metrics_addr {
        info!("serving metrics on {}", addr);
        tokio::spawn(metrics::serve_metrics(addr));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = Arc::new(config);
    let target = Arc::new(target);

    let mut clients = JoinSet::new();
    for client in 0..config.clients {
        clients.spawn(run_client(client, ip, target.clone(), config.clone(), shutdown_rx.clone()));
    }

    tokio::select! {
        code = wait_for_clients(&mut clients) => return Ok(code),
        _ = tokio::signal::ctrl_c() => {}
    }

    eprintln!("user terminated");
    tokio::select! {
        drained = drain_clients(&mut clients, &shutdown_tx, DRAIN_GRACE) => {
            if !drained {
                warn!("clients still busy after {:?}, exiting anyway", DRAIN_GRACE);
                // a client blocked mid-read is left to the OS
                std::process::exit(i32::from(EXIT_SUCCESS));
            }
        }
        _ = tokio::signal::ctrl_c() => std::process::exit(i32::from(EXIT_SUCCESS)),
    }
    Ok(EXIT_SUCCESS)
}

/// Joins every client, whatever the others do, and returns the exit code of
/// the first one that failed.
async fn wait_for_clients(clients: &mut JoinSet<Result<u64, ProbeError>>) -> u8 {
    let mut first_failure = None;
    while let Some(joined) = clients.join_next().await {
        match joined {
            Ok(Ok(runs)) => debug!("client finished after {} requests", runs),
            Ok(Err(e)) => {
                error!("{}", e);
                eprintln!("{e}");
                first_failure.get_or_insert(e.exit_code());
            }
            Err(e) => error!("client task failed: {:?}", e),
        }
    }
    first_failure.unwrap_or(EXIT_SUCCESS)
}

/// Flips the shutdown channel and gives clients `grace` to finish their
/// current cycle. False if some client is still running afterwards.
async fn drain_clients(
    clients: &mut JoinSet<Result<u64, ProbeError>>,
    shutdown: &watch::Sender<bool>,
    grace: Duration,
) -> bool {
    let _ = shutdown.send(true);
    match tokio::time::timeout(grace, wait_for_clients(clients)).await {
        Ok(code) => {
            debug!("clients drained, exit code {}", code);
            true
        }
        Err(_) => false,
    }
}

/// One independent client: its own sequence of cycles, its own previous
/// result to compare against.
async fn run_client(
    client: usize,
    ip: IpAddr,
    target: Arc<Target>,
    config: Arc<ProbeConfig>,
    shutdown: watch::Receiver<bool>,
) -> Result<u64, ProbeError> {
    let display = DisplayOptions::from(config.as_ref());
    let options = config.probe_options();
    let with_metrics = config.metrics_addr.is_some();
    let reporter = Arc::new(Mutex::new(StatusReporter::stdout(display)));

    let scheduler = Scheduler::new(config.wait_secs, config.max_requests);
    scheduler
        .run(shutdown, move |id| {
            let target = target.clone();
            let reporter = reporter.clone();
            async move {
                let cycle_target = target.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    let mut observer = ConsoleObserver::stdout(display);
                    run_probe_cycle(&cycle_target, ip, &options, &mut observer)
                })
                .await;

                let result = match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        if with_metrics {
                            metrics::inc_failure(&target.host, client);
                        }
                        return Err(e);
                    }
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                };
                debug!("client {} cycle {}: {:?}", client, id, result);

                if with_metrics {
                    metrics::observe_cycle(&target.host, client, &result);
                }
                let mut reporter = reporter.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Err(e) = reporter.report(id, result) {
                    debug!("writing status line: {}", e);
                }
                Ok(())
            }
        })
        .await
}
