//! [CecAdapter] over the linux CEC character devices.

use std::{
    io::{Error, ErrorKind, Result},
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    AdapterConfig, AdapterDescriptor, Capabilities, CecAdapter, CecCommand, CecDevice,
    CecLogAddrs, CecLogicalAddress, CecModeFollower, CecModeInitiator, CecMsg, CecOpcode,
    CecPowerStatus, CommandCallback, OSDStr, PowerStatus, CEC_PHYS_ADDR_INVALID,
};

/// how often to look whether the logical address got claimed
const CLAIM_POLL: Duration = Duration::from_millis(20);

/// An open adapter and the thread reading from it
struct Session {
    device: Arc<CecDevice>,
    stop: Arc<AtomicBool>,
    rx: Option<JoinHandle<()>>,
    timeout: Duration,
}

/// Talks to `/dev/cecN`
pub struct LinuxAdapter {
    config: AdapterConfig,
    callback: Option<CommandCallback>,
    session: Option<Session>,
}

impl LinuxAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            callback: None,
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn claim(&self, device: &CecDevice, timeout: Duration) -> Result<()> {
        let name: OSDStr<15> = self
            .config
            .device_name
            .clone()
            .try_into()
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "device name must be ASCII"))?;
        device.claim(CecLogAddrs::single(
            name,
            self.config.device_type,
            self.config.cec_version,
        ))?;
        // the claim finishes in the background if there is no physical address yet
        let deadline = Instant::now() + timeout;
        loop {
            let log = device.get_log()?;
            if let Some(addr) = log.addresses().first() {
                info!(address = ?addr, name = log.osd_name(), "claimed logical address");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("no logical address claimed yet, is the TV connected?");
                return Ok(());
            }
            thread::sleep(CLAIM_POLL);
        }
    }

}

impl CecAdapter for LinuxAdapter {
    fn detect_adapters(&mut self) -> Vec<AdapterDescriptor> {
        let dir = Path::new(&self.config.device_dir);
        let nodes = match cec_nodes(dir) {
            Ok(nodes) => nodes,
            Err(err) => {
                debug!(dir = %dir.display(), %err, "could not list devices");
                return Vec::new();
            }
        };
        nodes
            .into_iter()
            .filter_map(|path| {
                let caps = CecDevice::open(&path).and_then(|d| d.get_capas());
                match caps {
                    Ok(caps) => Some(AdapterDescriptor {
                        port: path.display().to_string(),
                        adapter_type: caps.driver().to_string(),
                    }),
                    Err(err) => {
                        debug!(node = %path.display(), %err, "skipping");
                        None
                    }
                }
            })
            .collect()
    }

    fn open(&mut self, port: &str, timeout: Duration) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists, "adapter already open"));
        }
        // we only listen and ask, the TV must never switch inputs because of us
        if self.config.activate_source {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "announcing as active source is not supported",
            ));
        }
        let device = CecDevice::open(port)?;
        device.set_mode(CecModeInitiator::Send, CecModeFollower::Exclusive)?;

        let caps = device.get_capas()?;
        info!(
            driver = caps.driver(),
            name = caps.name(),
            version = %caps.version(),
            phys = %phys_addr(device.get_phys()?),
            "opened {port}"
        );
        if caps.capabilities().contains(Capabilities::LOG_ADDRS) {
            self.claim(&device, timeout)?;
        }

        let device = Arc::new(device);
        let stop = Arc::new(AtomicBool::new(false));
        let rx = thread::Builder::new().name("cec-rx".into()).spawn({
            let device = device.clone();
            let stop = stop.clone();
            let callback = self.callback.clone();
            let tick = millis(timeout);
            move || receive_loop(&device, &stop, callback, tick)
        })?;

        self.session = Some(Session {
            device,
            stop,
            rx: Some(rx),
            timeout,
        });
        Ok(())
    }

    fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.stop.store(true, Ordering::Release);
        if let Some(rx) = session.rx.take() {
            if rx.join().is_err() {
                error!("receive thread panicked");
            }
        }
        if let Err(err) = session.device.release() {
            debug!(%err, "could not release logical addresses");
        }
        debug!("adapter closed");
    }

    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    fn power_status(&mut self, address: CecLogicalAddress) -> PowerStatus {
        let Some(session) = self.session.as_ref() else {
            return PowerStatus::Unknown;
        };
        let reply = session.device.request_data(
            own_address(&session.device),
            address,
            CecOpcode::GiveDevicePowerStatus,
            &[],
            CecOpcode::ReportPowerStatus,
            millis(session.timeout),
        );
        match reply {
            Ok(data) => parse_power_status(&data),
            Err(err) => {
                debug!(?address, %err, "power status request failed");
                PowerStatus::Unknown
            }
        }
    }
}

impl Drop for LinuxAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

fn receive_loop(
    device: &CecDevice,
    stop: &AtomicBool,
    callback: Option<CommandCallback>,
    tick: u32,
) {
    while !stop.load(Ordering::Acquire) {
        let msg = match device.rec_for(tick) {
            Ok(msg) => msg,
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => {
                if !stop.load(Ordering::Acquire) {
                    error!(%err, "receiving failed, no more commands from this adapter");
                }
                return;
            }
        };
        let Some(callback) = callback.as_ref() else {
            continue;
        };
        let cmd = command_of(&msg);
        if catch_unwind(AssertUnwindSafe(|| callback(&cmd))).is_err() {
            error!(command = %cmd, "command callback panicked");
        }
    }
}

fn command_of(msg: &CecMsg) -> CecCommand {
    CecCommand {
        initiator: msg.initiator(),
        destination: msg.destination(),
        opcode: msg.raw_opcode(),
        parameters: msg.parameters().to_vec(),
    }
}

/// Our first claimed address, Unregistered if there is none
fn own_address(device: &CecDevice) -> CecLogicalAddress {
    device
        .get_log()
        .ok()
        .and_then(|log| log.addresses().first().copied())
        .unwrap_or(CecLogicalAddress::UnregisteredBroadcast)
}

fn parse_power_status(data: &[u8]) -> PowerStatus {
    data.first()
        .and_then(|b| CecPowerStatus::try_from(*b).ok())
        .map(PowerStatus::from)
        .unwrap_or(PowerStatus::Unknown)
}

/// `3.3.0.0`, or `none` while the HDMI link is down
fn phys_addr(addr: u16) -> String {
    if addr == CEC_PHYS_ADDR_INVALID {
        return "none".to_string();
    }
    format!(
        "{}.{}.{}.{}",
        addr >> 12,
        (addr >> 8) & 0xf,
        (addr >> 4) & 0xf,
        addr & 0xf
    )
}

/// `0` would mean forever to the driver
fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX).max(1)
}

/// index of a `cecN` node name
fn cec_index(name: &str) -> Option<u32> {
    let n = name.strip_prefix("cec")?;
    if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    n.parse().ok()
}

/// All `cecN` entries of `dir`, lowest number first
fn cec_nodes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut nodes = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(idx) = entry.file_name().to_str().and_then(cec_index) {
            nodes.push((idx, entry.path()));
        }
    }
    nodes.sort();
    Ok(nodes.into_iter().map(|(_, p)| p).collect())
}
