//https://www.kernel.org/doc/html/latest/userspace-api/media/cec/cec-api.html

use bitflags::bitflags;
use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};
use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};

//#define CEC_ADAP_G_CAPS         _IOWR('a',  0, struct cec_caps)
ioctl_readwrite! {
    /// Query device capabilities
    /// Filled by the driver.
    capabilities, b'a',  0, CecCaps
}

/// information about the CEC adapter
#[derive(Debug)]
#[repr(C)]
pub struct CecCaps {
    /// name of the CEC device driver
    driver: OSDStr<32>,
    /// name of the CEC device. @driver + @name must be unique
    name: OSDStr<32>,
    /// number of available logical addresses
    available_log_addrs: u32,
    /// capabilities of the CEC adapter
    capabilities: Capabilities,
    /// version of the CEC adapter framework
    version: u32,
}
impl CecCaps {
    /// name of the kernel driver, e.g. `vc4_hdmi` or `pulse8-cec`
    #[inline]
    pub fn driver(&self) -> &str {
        self.driver.as_ref()
    }
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
    /// capabilities of the CEC adapter
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
    /// framework version as `major.minor.patch`
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            (self.version >> 16) & 0xff,
            (self.version >> 8) & 0xff,
            self.version & 0xff
        )
    }
}

bitflags! {
    /// capabilities of the CEC adapter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Userspace has to configure the physical address.
        const PHYS_ADDR = 0b00000001;
        /// Userspace has to configure the logical addresses. Done in [CecDevice::claim](super::CecDevice::claim)
        const LOG_ADDRS = 0b00000010;
        /// Userspace can transmit messages (and thus become [follower](CecModeFollower) as well)
        const TRANSMIT = 0b00000100;
        /// Passthrough all messages instead of processing them.
        const PASSTHROUGH = 0b00001000;
        /// Supports remote control
        const RC = 0b00010000;
        /// Hardware can monitor all messages, not just directed and broadcast.
        const MONITOR_ALL = 0b00100000;
    }
}

// CEC_ADAP_S_LOG_ADDRS
ioctl_readwrite! {
    /// Only available if CEC_CAP_LOG_ADDRS is set and only for a file descriptor in initiator mode.
    /// If the physical address is valid this blocks until all requested logical addresses have been claimed.
    /// Returns EBUSY when logical address types are already defined.
    set_log, b'a',  4, CecLogAddrs
}

// CEC_ADAP_G_LOG_ADDRS
ioctl_read! {
    /// Query logical addresses
    /// Filled by the driver.
    get_log, b'a',  3, CecLogAddrs
}

/// CEC logical addresses structure
///
/// Fields the driver fills in are kept as raw bytes,
/// an unconfigured adapter reports zeros there.
#[derive(Debug)]
#[repr(C)]
pub struct CecLogAddrs {
    /// the claimed logical addresses. Set by the driver.
    log_addr: [u8; CEC_MAX_LOG_ADDRS],
    /// current logical address mask. Set by the driver.
    log_addr_mask: CecLogAddrMask,
    /// the CEC version that the adapter should implement. Set by the caller.
    cec_version: u8,
    /// how many logical addresses should be claimed. Set by the caller.
    /// If this field is set to 0, then the CEC adapter shall clear all claimed logical addresses.
    num_log_addrs: u8,
    /// the vendor ID of the device. Set by the caller.
    vendor_id: u32,
    flags: CecLogAddrFlags,
    /// the OSD name of the device. Set by the caller.
    osd_name: OSDStr<15>,
    /// the primary device type for each logical address. Set by the caller.
    primary_device_type: [u8; CEC_MAX_LOG_ADDRS],
    /// the logical address types. Set by the caller.
    log_addr_type: [u8; CEC_MAX_LOG_ADDRS],
    /// CEC 2.0: all device types represented by the logical address.
    all_device_types: [u8; CEC_MAX_LOG_ADDRS],
    /// CEC 2.0: The logical address features.
    features: [[u8; 12]; CEC_MAX_LOG_ADDRS],
}
impl Default for CecLogAddrs {
    fn default() -> Self {
        Self {
            log_addr: [CEC_LOG_ADDR_INVALID; CEC_MAX_LOG_ADDRS],
            log_addr_mask: CecLogAddrMask::empty(),
            cec_version: Version::V1_4.into(),
            num_log_addrs: 0,
            vendor_id: CEC_VENDOR_ID_NONE,
            flags: CecLogAddrFlags::empty(),
            osd_name: Default::default(),
            primary_device_type: [0; CEC_MAX_LOG_ADDRS],
            log_addr_type: [0; CEC_MAX_LOG_ADDRS],
            all_device_types: [0; CEC_MAX_LOG_ADDRS],
            features: Default::default(),
        }
    }
}
impl CecLogAddrs {
    /// Request a single logical address of the given type.
    ///
    /// Falls back to Unregistered if no address of that type is free.
    pub fn single(osd_name: OSDStr<15>, device_type: CecPrimDevType, version: Version) -> Self {
        let mut log = Self {
            cec_version: version.into(),
            num_log_addrs: 1,
            flags: CecLogAddrFlags::ALLOW_UNREG_FALLBACK,
            osd_name,
            ..Default::default()
        };
        log.primary_device_type[0] = device_type.into();
        log.log_addr_type[0] = device_type.log_addr_type().into();
        log.all_device_types[0] = device_type.all_device_types();
        log
    }
    /// The logical addresses the driver reports as claimed
    pub fn addresses(&self) -> Vec<CecLogicalAddress> {
        let n = (self.num_log_addrs as usize).min(CEC_MAX_LOG_ADDRS);
        self.log_addr[..n]
            .iter()
            .filter(|a| **a != CEC_LOG_ADDR_INVALID)
            .filter_map(|a| CecLogicalAddress::try_from(*a).ok())
            .collect()
    }
    pub fn osd_name(&self) -> &str {
        self.osd_name.as_ref()
    }
}

bitflags! {
    /// Flags for [CecLogAddrs]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CecLogAddrFlags : u32 {
        /// If no logical address of the requested type can be claimed, fall back to the Unregistered logical address.
        const ALLOW_UNREG_FALLBACK = (1 << 0);
    }
}
/// CEC Version Operand for [CecOpcode::CecVersion]
#[repr(u8)]
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
pub enum Version {
    V1_3A = 4,
    V1_4 = 5,
    V2_0 = 6,
}

/// Primary Device Type Operand (prim_devtype)
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecPrimDevType {
    TV = 0,
    RECORD = 1,
    TUNER = 3,
    PLAYBACK = 4,
    AUDIOSYSTEM = 5,
    SWITCH = 6,
    PROCESSOR = 7,
}
impl CecPrimDevType {
    /// logical address type to claim for this device type
    pub fn log_addr_type(self) -> CecLogAddrType {
        match self {
            CecPrimDevType::TV => CecLogAddrType::TV,
            CecPrimDevType::RECORD => CecLogAddrType::RECORD,
            CecPrimDevType::TUNER => CecLogAddrType::TUNER,
            CecPrimDevType::PLAYBACK => CecLogAddrType::PLAYBACK,
            CecPrimDevType::AUDIOSYSTEM => CecLogAddrType::AUDIOSYSTEM,
            CecPrimDevType::SWITCH => CecLogAddrType::UNREGISTERED,
            CecPrimDevType::PROCESSOR => CecLogAddrType::SPECIFIC,
        }
    }
    /// All Device Types Operand bit (CEC 2.0)
    fn all_device_types(self) -> u8 {
        match self {
            CecPrimDevType::TV => 0x80,
            CecPrimDevType::RECORD => 0x40,
            CecPrimDevType::TUNER => 0x20,
            CecPrimDevType::PLAYBACK => 0x10,
            CecPrimDevType::AUDIOSYSTEM => 0x08,
            CecPrimDevType::SWITCH | CecPrimDevType::PROCESSOR => 0x04,
        }
    }
}
/// The logical address types that the CEC device wants to claim
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecLogAddrType {
    TV = 0,
    RECORD = 1,
    TUNER = 2,
    PLAYBACK = 3,
    AUDIOSYSTEM = 4,
    SPECIFIC = 5,
    UNREGISTERED = 6,
}

//#define CEC_ADAP_G_PHYS_ADDR    _IOR('a',  1, __u16)
ioctl_read! {
    /// Query physical addresses
    /// Filled by the driver.
    get_phys, b'a',  1, u16
}

//#define CEC_S_MODE              _IOW('a',  9, __u32)
ioctl_write_ptr! {
    /// If there is an exclusive follower, any further attempt to become (exclusive) follower fails with EBUSY.
    /// Closing the filehandle gives up the mode.
    set_mode, b'a',  9, u32
}
// ---  The message handling modes  ---
/// Modes for initiator
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeInitiator {
    /// Transmiting not possible (but others can)
    None = 0,
    /// **Default** Shared access
    Send = 1,
    /// Do not allow other senders
    Exclusive = 2,
}
/// Modes for follower
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeFollower {
    /// **Default**: Only retrieve replies to own (this handles) messages
    RepliesOnly = 0x0 << 4,
    /// Retrieve all messages for this device.
    All = 0x1 << 4,
    /// Retrieve all messages and lock this device.
    Exclusive = 0x2 << 4,
    /// Passthrough mode. The follower will have to implement most core messages.
    ExclusivePassthru = 0x3 << 4,
    /// Get all messages sent or received by this device. Needs `CAP_NET_ADMIN`.
    Monitor = 0xe << 4,
    /// As above but for all messages on the bus.
    MonitorAll = 0xf << 4,
}
// ---  Transmit/receive a CEC command  ---
//#define CEC_TRANSMIT            _IOWR('a',  5, struct cec_msg)
ioctl_readwrite! {
    /// Transmit a message. If `reply` is set, block until a reply with that opcode arrived or `timeout` passed.
    transmit, b'a',  5, CecMsg
}
//#define CEC_RECEIVE             _IOWR('a',  6, struct cec_msg)
ioctl_readwrite! {
    /// Receive a message. With a non-zero timeout ETIMEDOUT is returned if nothing arrived in time.
    receive, b'a',  6, CecMsg
}

const CEC_MAX_MSG_SIZE: usize = 16;

#[derive(Debug)]
#[repr(C)]
pub struct CecMsg {
    /// Timestamp in nanoseconds using CLOCK_MONOTONIC. Set by the driver when the message transmission has finished.
    tx_ts: u64,
    /// Timestamp in nanoseconds using CLOCK_MONOTONIC. Set by the driver when the message was received.
    rx_ts: u64,
    /// Length in bytes of the message.
    pub len: u32,
    /// The timeout (in ms) that is used to timeout CEC_RECEIVE.
    /// Set to 0 if you want to wait forever. Also the reply timeout for CEC_TRANSMIT.
    pub timeout: u32,
    /// The framework assigns a sequence number to messages that are sent.
    pub sequence: u32,
    /// No flags are defined yet, so set this to 0.
    flags: u32,
    /// The message payload.
    /// Includes initiator, destination and opcode.
    pub msg: [u8; CEC_MAX_MSG_SIZE],
    /// Only used by CEC_TRANSMIT. If non-zero, wait for a reply with this opcode.
    /// Zero upon return if there was an error or a FeatureAbort.
    pub reply: u8,
    /// The message receive status bits. Set by the driver.
    rx_status: RxStatus,
    /// The message transmit status bits. Set by the driver.
    tx_status: TxStatus,
    tx_arb_lost_cnt: u8,
    tx_nack_cnt: u8,
    tx_low_drive_cnt: u8,
    tx_error_cnt: u8,
}
impl CecMsg {
    /// return the initiator's logical address
    pub fn initiator(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.msg[0] >> 4)
    }
    /// return the destination's logical address
    pub fn destination(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.msg[0])
    }
    /// return the opcode of the message, None for poll
    pub fn opcode(&self) -> Option<Result<CecOpcode, TryFromPrimitiveError<CecOpcode>>> {
        self.raw_opcode().map(CecOpcode::try_from)
    }
    pub fn raw_opcode(&self) -> Option<u8> {
        if self.len > 1 {
            Some(self.msg[1])
        } else {
            None
        }
    }
    pub fn parameters(&self) -> &[u8] {
        let len = (self.len as usize).min(CEC_MAX_MSG_SIZE);
        if len > 2 {
            &self.msg[2..len]
        } else {
            &[]
        }
    }
    pub fn tx_ok(&self) -> bool {
        self.tx_status.contains(TxStatus::OK)
    }
    pub fn rx_ok(&self) -> bool {
        self.rx_status.contains(RxStatus::OK) && !self.rx_status.contains(RxStatus::FEATURE_ABORT)
    }
    pub fn init(from: CecLogicalAddress, to: CecLogicalAddress) -> CecMsg {
        let mut m = Self {
            tx_ts: 0,
            rx_ts: 0,
            len: 1,
            timeout: 0,
            sequence: 0,
            flags: 0,
            msg: [0; CEC_MAX_MSG_SIZE],
            reply: 0,
            rx_status: RxStatus::empty(),
            tx_status: TxStatus::empty(),
            tx_arb_lost_cnt: 0,
            tx_nack_cnt: 0,
            tx_low_drive_cnt: 0,
            tx_error_cnt: 0,
        };
        let f: u8 = from.into();
        let t: u8 = to.into();
        m.msg[0] = f << 4 | t;
        m
    }
}

// ---  cec status field  ---
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TxStatus: u8 {
        const OK          = (1 << 0);
        const ARB_LOST    = (1 << 1);
        const NACK        = (1 << 2);
        const LOW_DRIVE   = (1 << 3);
        const ERROR       = (1 << 4);
        const MAX_RETRIES = (1 << 5);
    }
}
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RxStatus: u8 {
        const OK            = (1 << 0);
        const TIMEOUT       = (1 << 1);
        const FEATURE_ABORT = (1 << 2);
    }
}

const CEC_LOG_ADDR_INVALID: u8 = 0xff;
pub const CEC_PHYS_ADDR_INVALID: u16 = 0xffff;
pub const CEC_VENDOR_ID_NONE: u32 = 0xffffffff;
/// The maximum number of logical addresses one device can be assigned to.
const CEC_MAX_LOG_ADDRS: usize = 4;

/// The logical addresses defined by CEC 2.0
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecLogicalAddress {
    Tv = 0,
    Record1 = 1,
    Record2 = 2,
    Tuner1 = 3,
    Playback1 = 4,
    Audiosystem = 5,
    Tuner2 = 6,
    Tuner3 = 7,
    Playback2 = 8,
    Record3 = 9,
    Tuner4 = 10,
    Playback3 = 11,
    Backup1 = 12,
    Backup2 = 13,
    Specific = 14,
    ///as initiator address
    UnregisteredBroadcast = 15,
}
impl CecLogicalAddress {
    /// every 4 bit value names an address
    pub fn from_nibble(n: u8) -> Self {
        match n & 0xf {
            0 => Self::Tv,
            1 => Self::Record1,
            2 => Self::Record2,
            3 => Self::Tuner1,
            4 => Self::Playback1,
            5 => Self::Audiosystem,
            6 => Self::Tuner2,
            7 => Self::Tuner3,
            8 => Self::Playback2,
            9 => Self::Record3,
            10 => Self::Tuner4,
            11 => Self::Playback3,
            12 => Self::Backup1,
            13 => Self::Backup2,
            14 => Self::Specific,
            _ => Self::UnregisteredBroadcast,
        }
    }
}

bitflags! {
    /// The bitmask of all logical addresses this adapter has claimed.
    ///
    /// If this adapter is not configured at all, then log_addr_mask is set to 0.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CecLogAddrMask: u16 {
        const Tv            = (1 << 0);
        const Record1       = (1 << 1);
        const Record2       = (1 << 2);
        const Record3       = (1 << 9);
        const Tuner1        = (1 << 3);
        const Tuner2        = (1 << 6);
        const Tuner3        = (1 << 7);
        const Tuner4        = (1 << 10);
        const Playback1     = (1 << 4);
        const Playback2     = (1 << 8);
        const Playback3     = (1 << 11);
        const Audiosystem   = (1 << 5);
        const Backup1       = (1 << 12);
        const Backup2       = (1 << 13);
        const Specific      = (1 << 14);
        /// adapter is Unregistered
        const Unregistered  = (1 << 15);
    }
}

/// The opcodes this crate sends or names in its logs
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecOpcode {
    /// __Parameters:__ 2byte - physical address of active source
    ActiveSource = 0x82,
    ImageViewOn = 0x04,
    TextViewOn = 0x0d,
    InactiveSource = 0x9d,
    RequestActiveSource = 0x85,
    RoutingChange = 0x80,
    RoutingInformation = 0x81,
    SetStreamPath = 0x86,
    Standby = 0x36,
    CecVersion = 0x9e,
    GetCecVersion = 0x9f,
    GivePhysicalAddr = 0x83,
    GetMenuLanguage = 0x91,
    ReportPhysicalAddr = 0x84,
    SetMenuLanguage = 0x32,
    ReportFeatures = 0xa6,
    GiveFeatures = 0xa5,
    DeviceVendorId = 0x87,
    GiveDeviceVendorId = 0x8c,
    VendorCommand = 0x89,
    VendorCommandWithId = 0xa0,
    VendorRemoteButtonDown = 0x8a,
    VendorRemoteButtonUp = 0x8b,
    GiveOsdName = 0x46,
    SetOsdName = 0x47,
    UserControlPressed = 0x44,
    UserControlReleased = 0x45,
    /// request [CecOpcode::ReportPowerStatus]
    GiveDevicePowerStatus = 0x8f,
    /// Answer to [CecOpcode::GiveDevicePowerStatus]
    /// __Parameters:__ [CecPowerStatus]
    ReportPowerStatus = 0x90,
    FeatureAbort = 0x00,
    Abort = 0xff,
}

// ---  Power Status Operand (pwr_state)  ---
/// Payload of [CecOpcode::ReportPowerStatus]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecPowerStatus {
    On = 0,
    Standby = 1,
    InTransitionStandbyToOn = 2,
    InTransitionOnToStandby = 3,
}

#[allow(non_camel_case_types)]
type c_char = u8; //its actually i8, but that sucks

/**
 * Create it from a String (String has to be ascii)
 * ```
 * # use cec_poweron::OSDStr;
 * let name: OSDStr::<15> = "execonpower".to_string().try_into().unwrap();
 * assert_eq!(name.as_ref(), "execonpower");
 * ```
 *
 * The last byte is kept for the terminating null, longer names are cut.
 */
#[repr(transparent)]
#[derive(Clone)]
pub struct OSDStr<const MAX: usize>([c_char; MAX]);

// from String to OSDStr
impl<const MAX: usize> TryFrom<String> for OSDStr<MAX> {
    type Error = ();
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !value.is_ascii() {
            return Err(());
        }
        let mut osd = OSDStr::default();
        let len = MAX.saturating_sub(1).min(value.len());
        osd.0[..len].copy_from_slice(&value.as_bytes()[..len]);
        Ok(osd)
    }
}

// from OSDStr to &str
impl<const MAX: usize> AsRef<str> for OSDStr<MAX> {
    fn as_ref(&self) -> &str {
        match std::ffi::CStr::from_bytes_until_nul(&self.0) {
            Ok(s) => s.to_str().unwrap_or_default(),
            Err(_) => {
                //no terminating null
                std::str::from_utf8(&self.0).unwrap_or_default()
            }
        }
    }
}
impl<const MAX: usize> std::fmt::Display for OSDStr<MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
impl<const MAX: usize> std::fmt::Debug for OSDStr<MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl<const MAX: usize> Default for OSDStr<MAX> {
    fn default() -> Self {
        Self([0; MAX])
    }
}
