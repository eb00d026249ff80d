use std::{path::PathBuf, process::ExitCode, thread};

use anyhow::{Context, Result};
use cec_poweron::{
    config::{self, DEFAULT_CONFIG_PATH},
    logging, Daemon, LinuxAdapter, ShellLauncher, ShutdownHandle, StopReason,
};
use clap::Parser;
use nix::sys::signal::{SigSet, Signal};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cec-poweron",
    version,
    about = "Starts a media player whenever the TV is switched on"
)]
struct Args {
    /// Config file. Defaults are used if it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Command that starts the player, overrides the config file.
    #[arg(long)]
    command: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,

    /// Also append the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_file.as_deref())?;

    // before any thread exists, so all of them inherit the mask
    let signals = shutdown_signals();
    signals
        .thread_block()
        .context("failed to block SIGINT/SIGTERM")?;

    let mut settings = config::load_or_default(&args.config)?;
    if let Some(command) = args.command {
        settings = settings.with_command(command)?;
    }
    info!(config = %args.config.display(), command = %settings.command, "starting");

    let adapter = LinuxAdapter::new(settings.adapter_config());
    let launcher = ShellLauncher::new(&settings.command);
    let mut daemon = Daemon::new(adapter, launcher, &settings);
    spawn_signal_thread(signals, daemon.shutdown_handle())?;

    Ok(match daemon.run() {
        StopReason::LaunchFailed => ExitCode::FAILURE,
        StopReason::Shutdown | StopReason::NoAdapter => ExitCode::SUCCESS,
    })
}

fn shutdown_signals() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    set
}

fn spawn_signal_thread(signals: SigSet, handle: ShutdownHandle) -> Result<()> {
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || loop {
            match signals.wait() {
                Ok(signal) => {
                    info!(%signal, "shutting down");
                    handle.shutdown();
                }
                Err(err) => {
                    error!(%err, "waiting for signals failed");
                    return;
                }
            }
        })
        .context("failed to spawn the signal thread")?;
    Ok(())
}
