/*!
 * Start a media player when the TV is switched on.
 *
 * Watches the HDMI-CEC bus through the [CEC linux API](https://www.kernel.org/doc/html/latest/userspace-api/media/cec/cec-api.html),
 * waits for the TV to power up, hands the adapter over to the player
 * and re-arms once the player exits again.
 *
 * The moving parts:
 * - [CecAdapter]: what the daemon needs from a CEC adapter, implemented for linux by [LinuxAdapter]
 * - [Launcher]: runs the player, see [ShellLauncher]
 * - [Daemon]: the discover → attach → wait for TV → launch loop
 *
 * ```no_run
 * # use cec_poweron::{Daemon, LinuxAdapter, ShellLauncher, Settings};
 * let settings = Settings::default();
 * let adapter = LinuxAdapter::new(settings.adapter_config());
 * let launcher = ShellLauncher::new(&settings.command);
 * let mut daemon = Daemon::new(adapter, launcher, &settings);
 * daemon.run();
 * ```
 */
mod sys;
use std::{
    io::{Error, ErrorKind, Result},
    mem::MaybeUninit,
    os::fd::AsRawFd,
};
use sys::{capabilities, get_log, get_phys, receive, set_log, set_mode, transmit};
pub use sys::{
    Capabilities, CecCaps, CecLogAddrFlags, CecLogAddrMask, CecLogAddrType, CecLogAddrs,
    CecLogicalAddress, CecModeFollower, CecModeInitiator, CecMsg, CecOpcode, CecPowerStatus,
    CecPrimDevType, OSDStr, Version, CEC_PHYS_ADDR_INVALID, CEC_VENDOR_ID_NONE,
};

pub mod adapter;
pub mod config;
pub mod daemon;
pub mod detector;
pub mod launcher;
pub mod linux;
pub mod logging;
pub mod session;
pub mod sync;

pub use adapter::{
    AdapterConfig, AdapterDescriptor, CallbackStatus, CecAdapter, CecCommand, CommandCallback,
    PowerStatus,
};
pub use config::{AdapterSettings, MissingAdapter, Settings, Timing};
pub use daemon::{Daemon, Flow, StopReason};
pub use launcher::{Launcher, ShellLauncher};
pub use linux::LinuxAdapter;
pub use sync::{Context, KeepGoing, ShutdownHandle, TvActivity};

#[cfg(test)]
mod testing;

/// A handle on a CEC device.
#[derive(Debug)]
pub struct CecDevice(std::fs::File);

impl CecDevice {
    /**
     * Open a CEC device. Typically `/dev/cecX`
     * ```no_run
     * # use cec_poweron::CecDevice;
     * # fn main() -> std::io::Result<()> {
     * let cec = CecDevice::open("/dev/cec0")?;
     * # Ok(())
     * # }
     * ```
     */
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Self)
    }
    /// query information on the devices capabilities. See [CecCaps]
    pub fn get_capas(&self) -> Result<CecCaps> {
        let mut capas = MaybeUninit::uninit();
        unsafe { capabilities(self.0.as_raw_fd(), capas.as_mut_ptr()) }?;
        Ok(unsafe { capas.assume_init() })
    }
    /// Change this handles mode.
    ///
    /// Becoming an exclusive follower fails with `EBUSY` (`ResourceBusy`)
    /// while another filehandle holds that mode, which is how a second
    /// user of the same adapter is kept out.
    pub fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()> {
        let mode = u32::from(initiator) | u32::from(follower);
        unsafe { set_mode(self.0.as_raw_fd(), &mode) }?;
        Ok(())
    }
    /// Query physical addresses
    /// e.g. 0x3300 -> 3.3.0.0
    pub fn get_phys(&self) -> Result<u16> {
        let mut addr = 0;
        unsafe { get_phys(self.0.as_raw_fd(), &mut addr) }?;
        Ok(addr)
    }
    /**
     *  Set logical address.
     *
     *  Only available if [Capabilities::LOG_ADDRS] is set.
     *  __Not__ possible with [CecModeInitiator::None].
     *
     *  If the physical address is valid, it will block until all requested logical addresses have been claimed.
     *  Attempting to call set_log when logical address types are already defined will return with error EBUSY,
     *  use [CecDevice::release] first.
     */
    pub fn set_log(&self, mut log: CecLogAddrs) -> Result<()> {
        unsafe { set_log(self.0.as_raw_fd(), &mut log) }?;
        Ok(())
    }
    /// Query logical addresses
    pub fn get_log(&self) -> Result<CecLogAddrs> {
        let mut log = MaybeUninit::uninit();
        unsafe { get_log(self.0.as_raw_fd(), log.as_mut_ptr()) }?;
        Ok(unsafe { log.assume_init() })
    }
    /// Drop any previous logical address configuration and claim `log` instead
    pub fn claim(&self, log: CecLogAddrs) -> Result<()> {
        self.release()?;
        self.set_log(log)
    }
    /// Give up all claimed logical addresses. The adapter goes to the unconfigured state.
    pub fn release(&self) -> Result<()> {
        self.set_log(CecLogAddrs::default())
    }
    /**
     * send a cec command with parameters and wait up to `timeout_ms` for a reply with opcode `wait_for`.
     * Then return its payload.
     * ```no_run
     * # use cec_poweron::{CecDevice, CecLogicalAddress, CecOpcode};
     * # fn main() -> std::io::Result<()> {
     * # let cec = CecDevice::open("/dev/cec0")?;
     * let status = cec.request_data(
     *     CecLogicalAddress::Record1,
     *     CecLogicalAddress::Tv,
     *     CecOpcode::GiveDevicePowerStatus,
     *     b"",
     *     CecOpcode::ReportPowerStatus,
     *     1000,
     * )?;
     * # Ok(())
     * # }
     * ```
     */
    pub fn request_data(
        &self,
        from: CecLogicalAddress,
        to: CecLogicalAddress,
        opcode: CecOpcode,
        data: &[u8],
        wait_for: CecOpcode,
        timeout_ms: u32,
    ) -> Result<Vec<u8>> {
        let mut msg = build_msg(from, to, opcode, data)?;
        msg.reply = wait_for.into();
        msg.timeout = timeout_ms;
        unsafe { transmit(self.0.as_raw_fd(), &mut msg) }?;
        if !msg.tx_ok() {
            return Err(Error::new(ErrorKind::Other, "request was not acknowledged"));
        }
        // reply is cleared by the driver if nothing (or a feature abort) came back
        if msg.reply == 0 || !msg.rx_ok() {
            return Err(Error::new(ErrorKind::TimedOut, "no reply"));
        }
        Ok(msg.parameters().to_vec())
    }
    /// receive a single message.
    /// block for at most `timeout` ms, `0` blocks forever.
    /// the available messages depend on [CecModeFollower]
    pub fn rec_for(&self, timeout: u32) -> Result<CecMsg> {
        // the driver overwrites everything but the timeout
        let mut msg = CecMsg::init(
            CecLogicalAddress::UnregisteredBroadcast,
            CecLogicalAddress::UnregisteredBroadcast,
        );
        msg.timeout = timeout;
        unsafe { receive(self.0.as_raw_fd(), &mut msg) }?;
        Ok(msg)
    }
}

impl AsRawFd for CecDevice {
    fn as_raw_fd(&self) -> std::os::unix::prelude::RawFd {
        self.0.as_raw_fd()
    }
}

fn build_msg(
    from: CecLogicalAddress,
    to: CecLogicalAddress,
    opcode: CecOpcode,
    data: &[u8],
) -> Result<CecMsg> {
    let mut msg = CecMsg::init(from, to);
    if data.len() > msg.msg.len() - 2 {
        return Err(ErrorKind::InvalidInput.into());
    }
    msg.msg[1] = opcode.into();
    msg.len = 2 + data.len() as u32;
    msg.msg[2..msg.len as usize].copy_from_slice(data);
    Ok(msg)
}
