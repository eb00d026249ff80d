use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use cec_poweron::{
    AdapterDescriptor, CecAdapter, CecCommand, CecLogicalAddress, CommandCallback, Daemon,
    Launcher, PowerStatus, Settings, ShutdownHandle, StopReason, Timing,
};

#[derive(Default)]
struct Counts {
    detect: AtomicUsize,
    open: AtomicUsize,
    close: AtomicUsize,
    launch: AtomicUsize,
}

/// Adapter `A` shows up on the third scan of the first cycle and is gone afterwards.
struct FakeAdapter {
    scans: VecDeque<Vec<AdapterDescriptor>>,
    counts: Arc<Counts>,
    /// pulled once the second cycle scans in vain
    stop: Arc<Mutex<Option<ShutdownHandle>>>,
    callback: Option<CommandCallback>,
}

impl CecAdapter for FakeAdapter {
    fn detect_adapters(&mut self) -> Vec<AdapterDescriptor> {
        let n = self.counts.detect.fetch_add(1, Ordering::SeqCst) + 1;
        if n > 3 {
            if let Some(handle) = self.stop.lock().unwrap().as_ref() {
                handle.shutdown();
            }
        }
        self.scans.pop_front().unwrap_or_default()
    }
    fn open(&mut self, port: &str, _timeout: Duration) -> io::Result<()> {
        assert_eq!(port, "/dev/cec0");
        self.counts.open.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn close(&mut self) {
        self.counts.close.fetch_add(1, Ordering::SeqCst);
    }
    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }
    fn power_status(&mut self, _address: CecLogicalAddress) -> PowerStatus {
        // the TV chatters on the bus while answering
        if let Some(cb) = self.callback.as_ref() {
            cb(&CecCommand::new(CecLogicalAddress::Tv, CecLogicalAddress::Record1));
        }
        PowerStatus::On
    }
}

struct FakePlayer {
    counts: Arc<Counts>,
}

impl Launcher for FakePlayer {
    fn describe(&self) -> &str {
        "fake player"
    }
    fn launch(&mut self) -> io::Result<i32> {
        self.counts.launch.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

fn quick_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timing = Timing {
        discovery_backoff: Duration::from_millis(2),
        open_timeout: Duration::from_millis(2),
        open_backoff: Duration::from_millis(2),
        poll_spacing: Duration::from_millis(2),
        settle: Duration::from_millis(2),
        cycle_delay: Duration::from_millis(2),
    };
    settings
}

#[test]
fn one_full_cycle_then_clean_shutdown() {
    let counts = Arc::new(Counts::default());
    let stop = Arc::new(Mutex::new(None));
    let found = AdapterDescriptor {
        port: "/dev/cec0".to_string(),
        adapter_type: "fake".to_string(),
    };
    let adapter = FakeAdapter {
        scans: VecDeque::from([vec![], vec![], vec![found]]),
        counts: counts.clone(),
        stop: stop.clone(),
        callback: None,
    };
    let player = FakePlayer {
        counts: counts.clone(),
    };

    let mut daemon = Daemon::new(adapter, player, &quick_settings());
    *stop.lock().unwrap() = Some(daemon.shutdown_handle());

    assert_eq!(daemon.run(), StopReason::Shutdown);
    assert_eq!(counts.detect.load(Ordering::SeqCst), 4);
    assert_eq!(counts.open.load(Ordering::SeqCst), 1);
    assert_eq!(counts.close.load(Ordering::SeqCst), 1);
    assert_eq!(counts.launch.load(Ordering::SeqCst), 1);
    assert!(!daemon.context().go());
}

#[test]
fn shutdown_from_another_thread_ends_discovery() {
    let counts = Arc::new(Counts::default());
    let adapter = FakeAdapter {
        scans: VecDeque::new(),
        counts: counts.clone(),
        stop: Arc::new(Mutex::new(None)),
        callback: None,
    };
    let player = FakePlayer {
        counts: counts.clone(),
    };
    let mut settings = quick_settings();
    // long enough that only the shutdown can end the wait
    settings.timing.discovery_backoff = Duration::from_secs(3600);

    let mut daemon = Daemon::new(adapter, player, &settings);
    let handle = daemon.shutdown_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        handle.shutdown();
    });

    assert_eq!(daemon.run(), StopReason::Shutdown);
    stopper.join().unwrap();
    assert_eq!(counts.detect.load(Ordering::SeqCst), 1);
    assert_eq!(counts.open.load(Ordering::SeqCst), 0);
}
