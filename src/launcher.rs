//! Running the media player and reading its verdict.

use std::{
    io::Result,
    os::unix::process::ExitStatusExt,
    process::{Command, ExitStatus},
    time::Duration,
};

use tracing::info;

use crate::{Context, Flow};

/// Runs the player and blocks until it exits.
pub trait Launcher {
    /// the command, for logging
    fn describe(&self) -> &str;
    /// Run to completion and return the exit status
    fn launch(&mut self) -> Result<i32>;
}

/// Runs a command line through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    command: String,
}

impl ShellLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Launcher for ShellLauncher {
    fn describe(&self) -> &str {
        &self.command
    }
    fn launch(&mut self) -> Result<i32> {
        let status = Command::new("sh").arg("-c").arg(&self.command).status()?;
        Ok(exit_code(status))
    }
}

/// Exit code, or 128 + signal number like a shell reports it
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

/// Run the player. A clean exit waits `settle` so the player can grab
/// the adapter; anything else is a broken setup and stops the daemon.
pub fn launch_and_wait<L: Launcher + ?Sized>(ctx: &Context, launcher: &mut L, settle: Duration) -> Flow {
    let command = launcher.describe().to_owned();
    info!(%command, "starting");
    match launcher.launch() {
        Ok(0) => {
            info!(%command, "exited normally");
            ctx.keep_going.pause(settle);
            Flow::Continue
        }
        Ok(code) => {
            info!(%command, code, "command failed, find the reason and restart this daemon");
            ctx.shutdown();
            Flow::Halt
        }
        Err(err) => {
            info!(%command, %err, "could not run command, find the reason and restart this daemon");
            ctx.shutdown();
            Flow::Halt
        }
    }
}
