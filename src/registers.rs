//! FUSB302 register map.
//!
//! Register layouts are bit-exact with the datasheet. Every layout converts from and into its raw
//! `u8`, so that masks can be built from named fields, e.g. `Switches0(0).with_pu_en1(true).0`.
use proc_bitfield::bitfield;

/// Register addresses.
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    DeviceId = 0x01,
    Switches0 = 0x02,
    Switches1 = 0x03,
    Measure = 0x04,
    Slice = 0x05,
    Control0 = 0x06,
    Control1 = 0x07,
    Control2 = 0x08,
    Control3 = 0x09,
    Mask = 0x0a,
    Power = 0x0b,
    Reset = 0x0c,
    OcpReg = 0x0d,
    MaskA = 0x0e,
    MaskB = 0x0f,
    Control4 = 0x10,
    Status0A = 0x3c,
    Status1A = 0x3d,
    InterruptA = 0x3e,
    InterruptB = 0x3f,
    Status0 = 0x40,
    Status1 = 0x41,
    Interrupt = 0x42,
    Fifo = 0x43,
}

impl From<Register> for u8 {
    fn from(register: Register) -> Self {
        register as u8
    }
}

/// Whether a register address accepts writes.
pub fn is_writable(address: u8) -> bool {
    address >= Register::Fifo as u8 || (address > Register::DeviceId as u8 && address <= Register::Control4 as u8)
}

/// Whether a register must always be read from the device, never from a cache.
pub fn is_volatile(address: u8) -> bool {
    address > Register::Control4 as u8
        || address == Register::Control0 as u8
        || address == Register::Control1 as u8
        || address == Register::Control3 as u8
        || address == Register::Reset as u8
}

/// Tokens that the transmit FIFO understands, and that frame received packets.
#[allow(missing_docs)]
pub mod token {
    pub const TX_ON: u8 = 0xa1;
    pub const SYNC1: u8 = 0x12;
    pub const SYNC2: u8 = 0x13;
    pub const SYNC3: u8 = 0x1b;
    pub const RESET1: u8 = 0x15;
    pub const RESET2: u8 = 0x16;
    /// Followed by the number of bytes to send, in the low 5 bits.
    pub const PACKSYM: u8 = 0x80;
    pub const JAM_CRC: u8 = 0xff;
    pub const EOP: u8 = 0x14;
    pub const TX_OFF: u8 = 0xfe;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// CC switch configuration.
    pub struct Switches0(pub u8): Debug, FromStorage, IntoStorage {
        /// Host pull-up current on CC2.
        pub pu_en2: bool @ 7,
        /// Host pull-up current on CC1.
        pub pu_en1: bool @ 6,
        /// VCONN on CC2.
        pub vconn_cc2: bool @ 5,
        /// VCONN on CC1.
        pub vconn_cc1: bool @ 4,
        /// Measure block on CC2.
        pub meas_cc2: bool @ 3,
        /// Measure block on CC1.
        pub meas_cc1: bool @ 2,
        /// Pull-down on CC2.
        pub pdwn2: bool @ 1,
        /// Pull-down on CC1.
        pub pdwn1: bool @ 0,
    }
}

impl Switches0 {
    /// Both pull-ups.
    pub const PULL_UP: u8 = 0xc0;
    /// Both pull-downs.
    pub const PULL_DOWN: u8 = 0x03;
    /// Both measure switches.
    pub const MEASURE: u8 = 0x0c;
    /// Both VCONN switches.
    pub const VCONN: u8 = 0x30;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// BMC transmitter configuration.
    pub struct Switches1(pub u8): Debug, FromStorage, IntoStorage {
        /// Power role bit of automatically generated GoodCRC messages.
        pub power_role: bool @ 7,
        /// Revision bits of automatically generated GoodCRC messages.
        pub spec_rev: u8 @ 5..=6,
        /// Data role bit of automatically generated GoodCRC messages.
        pub data_role: bool @ 4,
        /// Automatically answer valid packets with GoodCRC.
        pub auto_crc: bool @ 2,
        /// BMC transmitter on CC2.
        pub txcc2: bool @ 1,
        /// BMC transmitter on CC1.
        pub txcc1: bool @ 0,
    }
}

impl Switches1 {
    /// Both transmitter switches.
    pub const TXCC: u8 = 0x03;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Comparator threshold, with 42 mV per step.
    pub struct Measure(pub u8): Debug, FromStorage, IntoStorage {
        /// Measure VBUS instead of CC.
        pub meas_vbus: bool @ 6,
        /// Threshold of the DAC.
        pub mdac: u8 @ 0..=5,
    }
}

/// Host pull-up current advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostCurrent {
    /// No current.
    None,
    /// USB default current.
    Default,
    /// 1.5 A.
    Medium,
    /// 3.0 A.
    High,
}

impl From<u8> for HostCurrent {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::None,
            1 => Self::Default,
            2 => Self::Medium,
            _ => Self::High,
        }
    }
}

impl From<HostCurrent> for u8 {
    fn from(value: HostCurrent) -> Self {
        match value {
            HostCurrent::None => 0,
            HostCurrent::Default => 1,
            HostCurrent::Medium => 2,
            HostCurrent::High => 3,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// General control.
    pub struct Control0(pub u8): Debug, FromStorage, IntoStorage {
        /// Self-clearing, flushes the transmit FIFO.
        pub tx_flush: bool @ 6,
        /// Masks all interrupts when set.
        pub int_mask: bool @ 5,
        /// Host pull-up current.
        pub host_cur: u8 [HostCurrent] @ 2..=3,
        /// Start transmission of the FIFO content.
        pub tx_start: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Receiver control.
    pub struct Control1(pub u8): Debug, FromStorage, IntoStorage {
        /// Self-clearing, flushes the receive FIFO.
        pub rx_flush: bool @ 2,
    }
}

/// Toggle modes of the CONTROL2 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ToggleMode {
    /// Not toggling.
    Manual,
    /// Dual role toggling.
    Drp,
    /// Sink polling.
    Ufp,
    /// Source polling.
    Dfp,
}

impl From<u8> for ToggleMode {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::Manual,
            1 => Self::Drp,
            2 => Self::Ufp,
            _ => Self::Dfp,
        }
    }
}

impl From<ToggleMode> for u8 {
    fn from(value: ToggleMode) -> Self {
        match value {
            ToggleMode::Manual => 0,
            ToggleMode::Drp => 1,
            ToggleMode::Ufp => 2,
            ToggleMode::Dfp => 3,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Toggle control.
    pub struct Control2(pub u8): Debug, FromStorage, IntoStorage {
        /// Only stop toggling on Rd, not on Ra.
        pub tog_rd_only: bool @ 5,
        /// Toggle mode.
        pub mode: u8 [ToggleMode] @ 1..=2,
        /// Enable toggling.
        pub toggle: bool @ 0,
    }
}

impl Control2 {
    /// Mask of the mode and Rd-only bits.
    pub const MODE_MASK: u8 = 0x26;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Transmit retry control.
    pub struct Control3(pub u8): Debug, FromStorage, IntoStorage {
        /// Send a hard reset ordered set, self-clearing.
        pub send_hard_reset: bool @ 6,
        /// Number of automatic retries.
        pub n_retries: u8 @ 1..=2,
        /// Retry when no GoodCRC was received.
        pub auto_retry: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Toggle exit control.
    pub struct Control4(pub u8): Debug, FromStorage, IntoStorage {
        /// Stop toggling on an unoriented debug accessory.
        pub tog_usrc_exit: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Layout of the INTERRUPT and MASK registers.
    pub struct Interrupt(pub u8): Debug, FromStorage, IntoStorage {
        /// VBUS crossed the valid threshold.
        pub vbusok: bool @ 7,
        /// Activity on CC.
        pub activity: bool @ 6,
        /// The comparator output changed.
        pub comp_chng: bool @ 5,
        /// A received packet had a valid CRC.
        pub crc_chk: bool @ 4,
        /// Transmit FIFO full or receive FIFO overflow.
        pub alert: bool @ 3,
        /// Wake-up toggling detected.
        pub wake: bool @ 2,
        /// A transmission collided.
        pub collision: bool @ 1,
        /// The BC_LVL comparator changed.
        pub bc_lvl: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Layout of the INTERRUPTA and MASKA registers.
    pub struct InterruptA(pub u8): Debug, FromStorage, IntoStorage {
        /// Over-current or over-temperature.
        pub ocp_temp: bool @ 7,
        /// Toggling finished.
        pub togdone: bool @ 6,
        /// Soft reset transmission failed.
        pub softfail: bool @ 5,
        /// Transmission failed after all retries.
        pub retryfail: bool @ 4,
        /// A hard reset was sent.
        pub hardsent: bool @ 3,
        /// A packet was sent and acknowledged.
        pub txsent: bool @ 2,
        /// A soft reset was received.
        pub softrst: bool @ 1,
        /// A hard reset was received.
        pub hardrst: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Layout of the INTERRUPTB and MASKB registers.
    pub struct InterruptB(pub u8): Debug, FromStorage, IntoStorage {
        /// A GoodCRC was sent for a received packet.
        pub gcrcsent: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Software reset control.
    pub struct Reset(pub u8): Debug, FromStorage, IntoStorage {
        /// Reset the PD logic only.
        pub pd_reset: bool @ 1,
        /// Reset the whole chip, including registers.
        pub sw_reset: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Comparator and VBUS status.
    pub struct Status0(pub u8): Debug, FromStorage, IntoStorage {
        /// VBUS is above the valid threshold.
        pub vbusok: bool @ 7,
        /// CC voltage is above the MEASURE threshold.
        pub comp: bool @ 5,
        /// Coarse CC voltage level.
        pub bc_lvl: u8 @ 0..=1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Toggle status.
    pub struct Status1A(pub u8): Debug, FromStorage, IntoStorage {
        /// Result of the toggle logic.
        pub togss: u8 @ 3..=5,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Power domain enables.
    pub struct Power(pub u8): Debug, FromStorage, IntoStorage {
        /// Internal oscillator.
        pub pwr3: bool @ 3,
        /// Receiver and current references.
        pub pwr2: bool @ 2,
        /// Measure block.
        pub pwr1: bool @ 1,
        /// Bandgap and wake circuit.
        pub pwr0: bool @ 0,
    }
}

impl Power {
    /// All power domains on.
    pub fn all() -> Self {
        Self(0).with_pwr0(true).with_pwr1(true).with_pwr2(true).with_pwr3(true)
    }
}
