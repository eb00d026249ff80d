//! The outer loop: discover, attach, wait for the TV, launch, repeat.

use tracing::info;

use crate::{
    detector::tv_command_callback,
    session::{attach, discover},
    CecAdapter, Context, Launcher, MissingAdapter, Settings, ShutdownHandle, Timing,
};

/// Whether the loop may go round again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Why [Daemon::run] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// asked to stop from outside
    Shutdown,
    /// no adapter at startup and [MissingAdapter::Exit]
    NoAdapter,
    /// the player command failed, someone has to look at it
    LaunchFailed,
}

pub struct Daemon<A, L> {
    ctx: Context,
    adapter: A,
    launcher: L,
    timing: Timing,
    missing: MissingAdapter,
}

impl<A: CecAdapter, L: Launcher> Daemon<A, L> {
    /// Wires the adapter's command callback to a fresh [Context].
    pub fn new(mut adapter: A, launcher: L, settings: &Settings) -> Self {
        let ctx = Context::new();
        adapter.set_command_callback(tv_command_callback(ctx.tv_activity.clone()));
        Self {
            ctx,
            adapter,
            launcher,
            timing: settings.timing.clone(),
            missing: settings.on_missing_adapter,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.ctx.shutdown_handle()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Loop until stopped
    pub fn run(&mut self) -> StopReason {
        let mut missing = self.missing;
        while self.ctx.go() {
            let Some(found) = discover(&self.ctx, &mut self.adapter, &self.timing, missing) else {
                if self.ctx.go() {
                    info!("no CEC adapter found");
                    self.ctx.keep_going.stop();
                    return StopReason::NoAdapter;
                }
                break;
            };
            // once an adapter was there, it is worth waiting for it to come back
            missing = MissingAdapter::Wait;

            let flow = attach(
                &self.ctx,
                &mut self.adapter,
                &mut self.launcher,
                &found,
                &self.timing,
            );
            if flow == Flow::Halt {
                return StopReason::LaunchFailed;
            }
            self.ctx.keep_going.pause(self.timing.cycle_delay);
        }
        info!("stopped");
        StopReason::Shutdown
    }
}
