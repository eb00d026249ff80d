//! Scripted stand-ins for the adapter and the player.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    AdapterDescriptor, CecAdapter, CecLogicalAddress, CommandCallback, Launcher, PowerStatus,
    Timing,
};

pub fn descriptor(port: &str) -> AdapterDescriptor {
    AdapterDescriptor {
        port: port.to_string(),
        adapter_type: "scripted".to_string(),
    }
}

/// Timing that keeps tests quick
pub fn fast_timing() -> Timing {
    Timing {
        discovery_backoff: Duration::from_millis(1),
        open_timeout: Duration::from_millis(1),
        open_backoff: Duration::from_millis(1),
        poll_spacing: Duration::from_millis(1),
        settle: Duration::from_millis(1),
        cycle_delay: Duration::from_millis(1),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Detect,
    Open(String),
    Close,
    PowerStatus,
    Launch,
}

/// Shared record of calls, in order
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<(Call, Instant)>>>);

impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push((call, Instant::now()));
    }
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
    /// time between consecutive calls matching `pick`
    pub fn gaps(&self, pick: impl Fn(&Call) -> bool) -> Vec<Duration> {
        let times: Vec<Instant> = self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| pick(c))
            .map(|(_, t)| *t)
            .collect();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

type Hook = Box<dyn FnMut(usize) + Send>;

/// Plays back queued results. Empty queues mean: no adapters, open succeeds, TV in standby.
#[derive(Default)]
pub struct ScriptedAdapter {
    pub discoveries: VecDeque<Vec<AdapterDescriptor>>,
    pub open_results: VecDeque<io::Result<()>>,
    pub power: VecDeque<PowerStatus>,
    pub detect_calls: usize,
    pub open_calls: usize,
    pub close_calls: usize,
    pub power_queries: usize,
    pub is_open: bool,
    pub callback: Option<CommandCallback>,
    pub journal: Journal,
    /// called with the 1-based call count
    pub on_detect: Option<Hook>,
    pub on_open: Option<Hook>,
    pub on_power: Option<Hook>,
}

impl ScriptedAdapter {
    /// as if [CecAdapter::open] already succeeded
    pub fn opened() -> Self {
        Self {
            is_open: true,
            ..Default::default()
        }
    }
    pub fn detect_gaps(&self) -> Vec<Duration> {
        self.journal.gaps(|c| *c == Call::Detect)
    }
    pub fn open_gaps(&self) -> Vec<Duration> {
        self.journal.gaps(|c| matches!(c, Call::Open(_)))
    }
}

impl CecAdapter for ScriptedAdapter {
    fn detect_adapters(&mut self) -> Vec<AdapterDescriptor> {
        self.detect_calls += 1;
        self.journal.push(Call::Detect);
        if let Some(hook) = self.on_detect.as_mut() {
            hook(self.detect_calls);
        }
        self.discoveries.pop_front().unwrap_or_default()
    }
    fn open(&mut self, port: &str, _timeout: Duration) -> io::Result<()> {
        assert!(!self.is_open, "opened twice");
        self.open_calls += 1;
        self.journal.push(Call::Open(port.to_string()));
        if let Some(hook) = self.on_open.as_mut() {
            hook(self.open_calls);
        }
        let result = self.open_results.pop_front().unwrap_or(Ok(()));
        self.is_open = result.is_ok();
        result
    }
    fn close(&mut self) {
        self.close_calls += 1;
        self.journal.push(Call::Close);
        self.is_open = false;
    }
    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }
    fn power_status(&mut self, address: CecLogicalAddress) -> PowerStatus {
        assert!(self.is_open, "power status asked on a closed adapter");
        assert_eq!(address, CecLogicalAddress::Tv);
        self.power_queries += 1;
        self.journal.push(Call::PowerStatus);
        if let Some(hook) = self.on_power.as_mut() {
            hook(self.power_queries);
        }
        self.power.pop_front().unwrap_or(PowerStatus::Standby)
    }
}

/// Returns queued exit codes, 0 once they run out
#[derive(Default)]
pub struct ScriptedLauncher {
    pub results: VecDeque<io::Result<i32>>,
    pub calls: usize,
    pub journal: Journal,
}

impl ScriptedLauncher {
    pub fn with_codes(codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            results: codes.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }
}

impl Launcher for ScriptedLauncher {
    fn describe(&self) -> &str {
        "scripted player"
    }
    fn launch(&mut self) -> io::Result<i32> {
        self.calls += 1;
        self.journal.push(Call::Launch);
        self.results.pop_front().unwrap_or(Ok(0))
    }
}
