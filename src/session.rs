//! Finding an adapter and holding it while waiting for the TV.

use tracing::{debug, info};

use crate::{
    detector::wait_for_tv_on, launcher::launch_and_wait, AdapterDescriptor, CecAdapter, Context,
    Flow, Launcher, MissingAdapter, Timing,
};

/// Scan until an adapter shows up and return the first one.
///
/// `None` once the daemon stops, or right after the first empty scan with
/// [MissingAdapter::Exit].
pub fn discover<A: CecAdapter>(
    ctx: &Context,
    adapter: &mut A,
    timing: &Timing,
    missing: MissingAdapter,
) -> Option<AdapterDescriptor> {
    while ctx.go() {
        if let Some(found) = adapter.detect_adapters().into_iter().next() {
            info!(adapter = %found, "found an adapter");
            return Some(found);
        }
        if missing == MissingAdapter::Exit {
            return None;
        }
        debug!("no adapters found, retrying");
        ctx.keep_going.pause(timing.discovery_backoff);
    }
    None
}

/// Open `found`, retrying while it is busy, wait for the TV and hand over to the player.
///
/// The adapter is closed before the player starts, the player needs it.
/// [Flow::Halt] only if the player failed.
pub fn attach<A: CecAdapter, L: Launcher + ?Sized>(
    ctx: &Context,
    adapter: &mut A,
    launcher: &mut L,
    found: &AdapterDescriptor,
    timing: &Timing,
) -> Flow {
    ctx.tv_activity.clear();
    while ctx.go() {
        match adapter.open(&found.port, timing.open_timeout) {
            Ok(()) => {
                info!(port = %found.port, "connected to the adapter");
                let tv_on = wait_for_tv_on(ctx, adapter, timing.poll_spacing);
                adapter.close();
                if !tv_on {
                    return Flow::Continue;
                }
                return launch_and_wait(ctx, launcher, timing.settle);
            }
            Err(err) => {
                debug!(port = %found.port, %err, "couldn't open (busy?), retrying");
                ctx.keep_going.pause(timing.open_backoff);
            }
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{descriptor, fast_timing, Call, ScriptedAdapter, ScriptedLauncher},
        PowerStatus,
    };
    use std::{io, time::Duration};

    #[test]
    fn returns_first_of_first_nonempty_scan() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        adapter.discoveries.extend([
            vec![],
            vec![],
            vec![descriptor("/dev/cec1"), descriptor("/dev/cec0")],
            vec![descriptor("/dev/cec2")],
        ]);
        let found = discover(&ctx, &mut adapter, &fast_timing(), MissingAdapter::Wait);
        assert_eq!(found, Some(descriptor("/dev/cec1")));
        assert_eq!(adapter.detect_calls, 3);
    }

    #[test]
    fn empty_scans_back_off() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        adapter.discoveries.extend([vec![], vec![], vec![descriptor("/dev/cec0")]]);
        let timing = Timing {
            discovery_backoff: Duration::from_millis(20),
            ..fast_timing()
        };
        discover(&ctx, &mut adapter, &timing, MissingAdapter::Wait).unwrap();
        let gaps = adapter.detect_gaps();
        assert_eq!(gaps.len(), 2);
        assert!(gaps.iter().all(|g| *g >= Duration::from_millis(20)));
    }

    #[test]
    fn exit_policy_gives_up_after_one_scan() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        let found = discover(&ctx, &mut adapter, &fast_timing(), MissingAdapter::Exit);
        assert_eq!(found, None);
        assert_eq!(adapter.detect_calls, 1);
        // not a shutdown by itself
        assert!(ctx.go());
    }

    #[test]
    fn stopped_discovery_returns_none() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        let handle = ctx.shutdown_handle();
        adapter.on_detect = Some(Box::new(move |n| {
            if n == 3 {
                handle.shutdown();
            }
        }));
        assert_eq!(discover(&ctx, &mut adapter, &fast_timing(), MissingAdapter::Wait), None);
        assert_eq!(adapter.detect_calls, 3);
    }

    #[test]
    fn busy_adapter_is_retried_with_backoff() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        for _ in 0..3 {
            adapter
                .open_results
                .push_back(Err(io::Error::from_raw_os_error(nix::libc::EBUSY)));
        }
        adapter.power.push_back(PowerStatus::On);
        let mut launcher = ScriptedLauncher::with_codes([0]);
        let timing = Timing {
            open_backoff: Duration::from_millis(20),
            ..fast_timing()
        };

        let flow = attach(&ctx, &mut adapter, &mut launcher, &descriptor("/dev/cec0"), &timing);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(adapter.open_calls, 4);
        let gaps = adapter.open_gaps();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.iter().all(|g| *g >= Duration::from_millis(20)));
        assert_eq!(launcher.calls, 1);
    }

    #[test]
    fn closes_before_launching() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        adapter.power.push_back(PowerStatus::On);
        let mut launcher = ScriptedLauncher::with_codes([0]);
        launcher.journal = adapter.journal.clone();

        attach(&ctx, &mut adapter, &mut launcher, &descriptor("/dev/cec0"), &fast_timing());

        assert_eq!(
            adapter.journal.calls(),
            vec![
                Call::Open("/dev/cec0".into()),
                Call::PowerStatus,
                Call::Close,
                Call::Launch,
            ]
        );
        assert!(!adapter.is_open);
        assert!(ctx.go());
    }

    #[test]
    fn failed_player_halts() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        adapter.power.push_back(PowerStatus::On);
        let mut launcher = ScriptedLauncher::with_codes([17]);

        let flow = attach(&ctx, &mut adapter, &mut launcher, &descriptor("/dev/cec0"), &fast_timing());

        assert_eq!(flow, Flow::Halt);
        assert!(!ctx.go());
        assert_eq!(adapter.close_calls, 1);
    }

    #[test]
    fn closes_without_launching_on_shutdown() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        let handle = ctx.shutdown_handle();
        adapter.on_power = Some(Box::new(move |_| handle.shutdown()));
        let mut launcher = ScriptedLauncher::with_codes([0]);

        let flow = attach(&ctx, &mut adapter, &mut launcher, &descriptor("/dev/cec0"), &fast_timing());

        assert_eq!(flow, Flow::Continue);
        assert_eq!(adapter.close_calls, 1);
        assert!(!adapter.is_open);
        assert_eq!(launcher.calls, 0);
    }

    #[test]
    fn stop_during_open_closes_again() {
        let ctx = Context::new();
        let mut adapter = ScriptedAdapter::default();
        adapter
            .open_results
            .push_back(Err(io::Error::from_raw_os_error(nix::libc::EBUSY)));
        let handle = ctx.shutdown_handle();
        adapter.on_open = Some(Box::new(move |n| {
            if n == 2 {
                handle.shutdown();
            }
        }));
        let mut launcher = ScriptedLauncher::default();

        attach(&ctx, &mut adapter, &mut launcher, &descriptor("/dev/cec0"), &fast_timing());
        // stopped during the second open: no poll, but the adapter is released
        assert_eq!(adapter.open_calls, 2);
        assert_eq!(adapter.close_calls, 1);
        assert_eq!(adapter.power_queries, 0);
    }
}
