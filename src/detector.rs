//! Waiting for the TV to come up.
//!
//! Polling alone would be slow, commands alone can be missed, and the TV
//! may well be on already when we attach. So: poll, and if it is not on,
//! sleep until the TV says anything on the bus, then poll again.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    CallbackStatus, CecAdapter, CecCommand, CecLogicalAddress, CommandCallback, Context,
    TvActivity,
};

/// Block until the TV reports being on (`true`) or the daemon stops (`false`).
///
/// `poll_spacing` is the minimum time between two power status queries.
pub fn wait_for_tv_on<A: CecAdapter>(ctx: &Context, adapter: &mut A, poll_spacing: Duration) -> bool {
    while ctx.go() {
        let status = adapter.power_status(CecLogicalAddress::Tv);
        if status.is_on() {
            info!(?status, "TV is ON");
            return true;
        }
        debug!(?status, "TV is not on, waiting for it to speak");
        ctx.keep_going.pause(poll_spacing);
        ctx.tv_activity.wait();
    }
    false
}

/// The callback to register with the adapter: any command sent by the TV sets `tv`.
pub fn tv_command_callback(tv: TvActivity) -> CommandCallback {
    Arc::new(move |cmd: &CecCommand| on_command(&tv, cmd))
}

fn on_command(tv: &TvActivity, cmd: &CecCommand) -> CallbackStatus {
    debug!(command = %cmd, "CEC command");
    if cmd.initiator == CecLogicalAddress::Tv {
        tv.set();
    }
    CallbackStatus::Handled
}
