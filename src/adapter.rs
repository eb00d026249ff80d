//! What the daemon needs from a CEC adapter.

use std::{fmt, io::Result, sync::Arc, time::Duration};

use crate::{CecLogicalAddress, CecOpcode, CecPowerStatus, CecPrimDevType, Version};

/// One adapter found by [CecAdapter::detect_adapters]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// what to pass to [CecAdapter::open], e.g. `/dev/cec0`
    pub port: String,
    /// kind of hardware behind the port, e.g. the kernel driver name
    pub adapter_type: String,
}

impl fmt::Display for AdapterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' adapter on [{}]", self.adapter_type, self.port)
    }
}

/// How we present ourselves on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// OSD name, ASCII. Cut to 14 characters.
    pub device_name: String,
    pub device_type: CecPrimDevType,
    pub cec_version: Version,
    /// announce ourselves as active source after opening.
    /// [crate::LinuxAdapter] refuses to open with this set.
    pub activate_source: bool,
    /// where [crate::LinuxAdapter] looks for `cecN` nodes
    pub device_dir: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            device_name: "execonpower".to_string(),
            device_type: CecPrimDevType::RECORD,
            cec_version: Version::V1_4,
            activate_source: false,
            device_dir: "/dev".to_string(),
        }
    }
}

/// A command seen on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CecCommand {
    /// source of the command
    pub initiator: CecLogicalAddress,
    pub destination: CecLogicalAddress,
    /// None for a poll message
    pub opcode: Option<u8>,
    pub parameters: Vec<u8>,
}

impl CecCommand {
    pub fn new(initiator: CecLogicalAddress, destination: CecLogicalAddress) -> Self {
        Self {
            initiator,
            destination,
            opcode: None,
            parameters: Vec::new(),
        }
    }
    pub fn with_opcode(mut self, opcode: CecOpcode) -> Self {
        self.opcode = Some(opcode.into());
        self
    }
}

impl fmt::Display for CecCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.initiator, self.destination)?;
        match self.opcode.map(|o| (o, CecOpcode::try_from(o))) {
            Some((_, Ok(op))) => write!(f, " {op:?}")?,
            Some((raw, Err(_))) => write!(f, " {raw:#04x}")?,
            None => f.write_str(" <poll>")?,
        }
        if !self.parameters.is_empty() {
            write!(f, " {:02x?}", self.parameters)?;
        }
        Ok(())
    }
}

/// What a [CommandCallback] tells the adapter.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Handled = 0,
}

/// Invoked on the adapter's own thread for every received command.
///
/// Must not block.
pub type CommandCallback = Arc<dyn Fn(&CecCommand) -> CallbackStatus + Send + Sync>;

/// Power state reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    On,
    Standby,
    InTransitionStandbyToOn,
    InTransitionOnToStandby,
    /// no answer, or not asked at all
    Unknown,
}

impl PowerStatus {
    /// on, or about to be
    pub fn is_on(self) -> bool {
        matches!(self, PowerStatus::On | PowerStatus::InTransitionStandbyToOn)
    }
}

impl From<CecPowerStatus> for PowerStatus {
    fn from(value: CecPowerStatus) -> Self {
        match value {
            CecPowerStatus::On => PowerStatus::On,
            CecPowerStatus::Standby => PowerStatus::Standby,
            CecPowerStatus::InTransitionStandbyToOn => PowerStatus::InTransitionStandbyToOn,
            CecPowerStatus::InTransitionOnToStandby => PowerStatus::InTransitionOnToStandby,
        }
    }
}

/// Access to CEC adapters.
///
/// At most one adapter is open at a time. Opening may fail while another
/// process holds the adapter, callers are expected to retry.
pub trait CecAdapter {
    /// List the adapters that are currently visible
    fn detect_adapters(&mut self) -> Vec<AdapterDescriptor>;
    /// Take the adapter on `port`. `timeout` bounds the handshake.
    fn open(&mut self, port: &str, timeout: Duration) -> Result<()>;
    /// Release the open adapter. Does nothing if none is open.
    fn close(&mut self);
    /// Register the callback for received commands. Takes effect on the next [CecAdapter::open].
    fn set_command_callback(&mut self, callback: CommandCallback);
    /// Ask `address` for its power status
    fn power_status(&mut self, address: CecLogicalAddress) -> PowerStatus;
}

impl<A: CecAdapter + ?Sized> CecAdapter for &mut A {
    fn detect_adapters(&mut self) -> Vec<AdapterDescriptor> {
        (**self).detect_adapters()
    }
    fn open(&mut self, port: &str, timeout: Duration) -> Result<()> {
        (**self).open(port, timeout)
    }
    fn close(&mut self) {
        (**self).close()
    }
    fn set_command_callback(&mut self, callback: CommandCallback) {
        (**self).set_command_callback(callback)
    }
    fn power_status(&mut self, address: CecLogicalAddress) -> PowerStatus {
        (**self).power_status(address)
    }
}
