//! Structured vendor defined messages and the DisplayPort alternate mode objects.
use proc_bitfield::bitfield;

/// The USB PD standard ID.
pub const PD_SID: u16 = 0xff00;
/// The DisplayPort standard ID.
pub const DISPLAYPORT_SID: u16 = 0xff01;

/// VDM command types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommandType {
    /// Request by the initiator.
    InitiatorREQ,
    /// Acknowledged by the responder.
    ResponderACK,
    /// Rejected by the responder.
    ResponderNAK,
    /// The responder is busy.
    ResponderBSY,
}

impl From<VdmCommandType> for u8 {
    fn from(value: VdmCommandType) -> Self {
        match value {
            VdmCommandType::InitiatorREQ => 0,
            VdmCommandType::ResponderACK => 1,
            VdmCommandType::ResponderNAK => 2,
            VdmCommandType::ResponderBSY => 3,
        }
    }
}

impl From<u8> for VdmCommandType {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => VdmCommandType::InitiatorREQ,
            1 => VdmCommandType::ResponderACK,
            2 => VdmCommandType::ResponderNAK,
            _ => VdmCommandType::ResponderBSY,
        }
    }
}

/// VDM commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommand {
    /// Discover identity.
    DiscoverIdentity,
    /// Discover SVIDs.
    DiscoverSVIDS,
    /// Discover modes of an SVID.
    DiscoverModes,
    /// Enter a mode.
    EnterMode,
    /// Exit a mode.
    ExitMode,
    /// Attention, sent by the UFP.
    Attention,
    /// DisplayPort status update.
    DisplayPortStatus,
    /// DisplayPort configuration.
    DisplayPortConfig,
    /// Any other command.
    Other(u8),
}

impl From<VdmCommand> for u8 {
    fn from(value: VdmCommand) -> Self {
        match value {
            VdmCommand::DiscoverIdentity => 0x1,
            VdmCommand::DiscoverSVIDS => 0x2,
            VdmCommand::DiscoverModes => 0x3,
            VdmCommand::EnterMode => 0x4,
            VdmCommand::ExitMode => 0x5,
            VdmCommand::Attention => 0x6,
            VdmCommand::DisplayPortStatus => 0x10,
            VdmCommand::DisplayPortConfig => 0x11,
            VdmCommand::Other(command) => command,
        }
    }
}

impl From<u8> for VdmCommand {
    fn from(value: u8) -> Self {
        match value {
            0x01 => VdmCommand::DiscoverIdentity,
            0x02 => VdmCommand::DiscoverSVIDS,
            0x03 => VdmCommand::DiscoverModes,
            0x04 => VdmCommand::EnterMode,
            0x05 => VdmCommand::ExitMode,
            0x06 => VdmCommand::Attention,
            0x10 => VdmCommand::DisplayPortStatus,
            0x11 => VdmCommand::DisplayPortConfig,
            other => VdmCommand::Other(other),
        }
    }
}

/// Structured or unstructured VDM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmType {
    /// Vendor specific layout.
    Unstructured,
    /// Layout defined by the USB PD specification.
    Structured,
}

impl From<VdmType> for bool {
    fn from(value: VdmType) -> Self {
        match value {
            VdmType::Unstructured => false,
            VdmType::Structured => true,
        }
    }
}

impl From<bool> for VdmType {
    fn from(value: bool) -> Self {
        match value {
            true => VdmType::Structured,
            false => VdmType::Unstructured,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// Header of a structured VDM.
    pub struct VdmHeaderStructured(pub u32): FromStorage, IntoStorage {
        /// VDM Standard or Vendor ID
        pub standard_or_vid: u16 @ 16..=31,
        /// VDM Type (Unstructured/Structured)
        pub vdm_type: bool [VdmType] @ 15,
        /// Structured VDM version, major
        pub vdm_version_major: u8 @ 13..=14,
        /// Structured VDM version, minor
        pub vdm_version_minor: u8 @ 11..=12,
        /// Object Position
        pub object_position: u8 @ 8..=10,
        /// Command Type
        pub command_type: u8 [VdmCommandType] @ 6..=7,
        /// Command
        pub command: u8 [VdmCommand] @ 0..=4,
    }
}

impl Default for VdmHeaderStructured {
    fn default() -> Self {
        VdmHeaderStructured(0).with_vdm_type(VdmType::Structured)
    }
}

impl VdmHeaderStructured {
    /// A request with the given command, towards an SVID and object position.
    pub fn request(svid: u16, object_position: u8, command: VdmCommand) -> Self {
        Self::default()
            .with_standard_or_vid(svid)
            .with_object_position(object_position)
            .with_command_type(VdmCommandType::InitiatorREQ)
            .with_command(command)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Two SVIDs, as returned by the discover SVIDs command.
    pub struct SvidPair(pub u32): FromStorage, IntoStorage {
        /// First SVID
        pub svid0: u16 @ 16..=31,
        /// Second SVID
        pub svid1: u16 @ 0..=15,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// DisplayPort capabilities, the mode VDO of the DisplayPort SVID.
    pub struct DisplayPortCapabilities(pub u32): FromStorage, IntoStorage {
        /// UFP_D pin assignments
        pub ufp_d_pins: u8 @ 16..=23,
        /// DFP_D pin assignments
        pub dfp_d_pins: u8 @ 8..=15,
        /// USB 2.0 signaling not used
        pub usb20_not_used: bool @ 7,
        /// Receptacle (1) or plug (0)
        pub receptacle: bool @ 6,
        /// Supports USB Gen 2 signaling
        pub gen2: bool @ 3,
        /// Supports DP v1.3
        pub dp_v13: bool @ 2,
        /// Port capability
        pub port_capability: u8 @ 0..=1,
    }
}

impl DisplayPortCapabilities {
    /// Pin assignments that apply to this port, as a bit map A (bit 0) to F (bit 5).
    pub fn pin_capabilities(&self) -> u8 {
        if self.receptacle() {
            self.ufp_d_pins() & 0x3f
        } else {
            self.dfp_d_pins() & 0x3f
        }
    }

    /// Whether the mode has no pin assignment at all.
    pub fn has_no_pins(&self) -> bool {
        self.ufp_d_pins() == 0 && self.dfp_d_pins() == 0
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// DisplayPort status VDO.
    pub struct DisplayPortStatus(pub u32): FromStorage, IntoStorage {
        /// An HPD interrupt arrived since the last message
        pub irq_hpd: bool @ 8,
        /// HPD level
        pub hpd_state: bool @ 7,
        /// Request to exit the DisplayPort mode
        pub exit_request: bool @ 6,
        /// Request to switch to USB configuration
        pub usb_config_request: bool @ 5,
        /// Multi-function preferred
        pub multi_function_preferred: bool @ 4,
        /// DisplayPort functionality enabled
        pub enabled: bool @ 3,
        /// Power low
        pub power_low: bool @ 2,
        /// Connection status
        pub connected: u8 @ 0..=1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// DisplayPort configuration VDO.
    pub struct DisplayPortConfig(pub u32): FromStorage, IntoStorage {
        /// Pin assignment to configure
        pub pin_assignment: u8 @ 8..=15,
        /// Signaling, 1 for DP v1.3
        pub signaling: u8 @ 2..=5,
        /// Configuration, 2 for UFP_U as UFP_D
        pub select_configuration: u8 @ 0..=1,
    }
}

/// DisplayPort pin assignments, as bit masks.
#[allow(missing_docs)]
pub mod pin {
    pub const A: u8 = 1 << 0;
    pub const B: u8 = 1 << 1;
    pub const C: u8 = 1 << 2;
    pub const D: u8 = 1 << 3;
    pub const E: u8 = 1 << 4;
    pub const F: u8 = 1 << 5;

    /// Assignments that support multi-function.
    pub const MULTI_FUNCTION: u8 = B | D | F;
    /// Assignments with USB Gen 2 signaling levels.
    pub const GEN2_SIGNALING: u8 = A | B;
    /// Assignments with DisplayPort signaling levels.
    pub const DP_SIGNALING: u8 = C | D | E | F;
}

/// Choose the DisplayPort pin assignment for a partner's capabilities and status.
///
/// Multi-function assignments are only used when the partner prefers them. C and D take
/// precedence over E and F. Among the remaining ones, the highest assignment wins. Returns zero
/// if no assignment is possible.
pub fn choose_pin_assignment(capabilities: DisplayPortCapabilities, status: DisplayPortStatus) -> u8 {
    let mut pins = capabilities.pin_capabilities();

    if !status.multi_function_preferred() {
        pins &= !pin::MULTI_FUNCTION;
    }

    if capabilities.gen2() {
        pins &= !pin::DP_SIGNALING;
    } else {
        pins &= !pin::GEN2_SIGNALING;
    }

    if pins & (pin::C | pin::D) != 0 {
        pins &= !(pin::E | pin::F);
    }

    if pins == 0 {
        0
    } else {
        1 << (7 - pins.leading_zeros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plug_with_pins(pins: u8) -> DisplayPortCapabilities {
        DisplayPortCapabilities::default().with_dfp_d_pins(pins)
    }

    #[test]
    fn multi_function_masked_without_preference() {
        let capabilities = plug_with_pins(0b00_0110);

        assert_eq!(choose_pin_assignment(capabilities, DisplayPortStatus::default()), pin::C);
    }

    #[test]
    fn c_and_d_win_over_e_and_f() {
        let status = DisplayPortStatus::default().with_multi_function_preferred(true);

        assert_eq!(choose_pin_assignment(plug_with_pins(pin::C | pin::E), status), pin::C);
        assert_eq!(
            choose_pin_assignment(plug_with_pins(pin::C | pin::D | pin::F), status),
            pin::D
        );
        assert_eq!(choose_pin_assignment(plug_with_pins(pin::E | pin::F), status), pin::F);
    }

    #[test]
    fn gen2_keeps_only_a_and_b() {
        let capabilities = plug_with_pins(pin::A | pin::C | pin::E).with_gen2(true);

        assert_eq!(choose_pin_assignment(capabilities, DisplayPortStatus::default()), pin::A);
    }

    #[test]
    fn receptacle_uses_ufp_pins() {
        let capabilities = DisplayPortCapabilities::default()
            .with_receptacle(true)
            .with_dfp_d_pins(pin::C)
            .with_ufp_d_pins(pin::E);

        assert_eq!(choose_pin_assignment(capabilities, DisplayPortStatus::default()), pin::E);
    }

    #[test]
    fn nothing_left() {
        assert_eq!(
            choose_pin_assignment(plug_with_pins(pin::B | pin::D), DisplayPortStatus::default()),
            0
        );
    }

    #[test]
    fn request_header_layout() {
        let header = VdmHeaderStructured::request(DISPLAYPORT_SID, 1, VdmCommand::EnterMode);

        assert_eq!(header.0, (0xff01 << 16) | (1 << 15) | (1 << 8) | 0x04);
        assert_eq!(header.command_type(), VdmCommandType::InitiatorREQ);
    }
}
