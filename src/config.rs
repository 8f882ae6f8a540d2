//! Static configuration of a port.
use heapless::Vec;

use crate::protocol_layer::message::pdo::{FixedSupply, Kind};
use crate::registers::HostCurrent;
use crate::{RoleMode, TryRole};

/// The maximum number of advertised source capabilities.
pub const MAX_SOURCE_CAPABILITIES: usize = 7;

/// Current that the port advertises with its pull-up, when acting as source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RpCurrent {
    /// USB default current.
    #[default]
    Default,
    /// 1.5 A.
    Current1A5,
    /// 3.0 A.
    Current3A0,
}

impl RpCurrent {
    /// Comparator thresholds `(high, low)` for the MEASURE register.
    ///
    /// The high threshold separates an open line from Rd, the low one Rd from Ra.
    pub fn thresholds(self) -> (u8, u8) {
        match self {
            RpCurrent::Default => (0x26, 0x05),
            RpCurrent::Current1A5 => (0x26, 0x0a),
            RpCurrent::Current3A0 => (0x3e, 0x13),
        }
    }

    /// The matching host current setting.
    pub fn host_current(self) -> HostCurrent {
        match self {
            RpCurrent::Default => HostCurrent::Default,
            RpCurrent::Current1A5 => HostCurrent::Medium,
            RpCurrent::Current3A0 => HostCurrent::High,
        }
    }
}

/// Capability flags that are advertised with the source capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PdCapInfo {
    /// Raw supply type of the advertised objects.
    pub supply_type: u8,
    /// Dual-role power.
    pub dual_role_power: bool,
    /// USB suspend supported.
    pub usb_suspend_support: bool,
    /// Externally powered.
    pub externally_powered: bool,
    /// USB communications capable.
    pub usb_communications_cap: bool,
    /// Data role swap supported.
    pub data_role_swap: bool,
    /// Raw peak current field.
    pub peak_current: u8,
}

impl Default for PdCapInfo {
    fn default() -> Self {
        Self {
            supply_type: Kind::FixedSupply.into(),
            dual_role_power: true,
            usb_suspend_support: false,
            externally_powered: true,
            usb_communications_cap: false,
            data_role_swap: true,
            peak_current: 0,
        }
    }
}

/// One advertised fixed supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceCapability {
    /// Voltage in 50 mV units.
    pub raw_voltage: u16,
    /// Maximum current in 10 mA units.
    pub raw_max_current: u16,
}

impl Default for SourceCapability {
    /// 5 V at 1.5 A.
    fn default() -> Self {
        Self {
            raw_voltage: 0x64,
            raw_max_current: 0x96,
        }
    }
}

/// Port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Which roles the port may take.
    pub role: RoleMode,
    /// Preferred role of a dual role port.
    pub try_role: TryRole,
    /// Whether the port can source VCONN.
    pub vconn_supported: bool,
    /// Advertised pull-up current.
    pub rp_current: RpCurrent,
    /// Flags of the advertised source capabilities.
    pub capability_info: PdCapInfo,
    /// Advertised source capabilities.
    pub source_capabilities: Vec<SourceCapability, MAX_SOURCE_CAPABILITIES>,
}

impl Default for Config {
    fn default() -> Self {
        let mut source_capabilities = Vec::new();
        let _ = source_capabilities.push(SourceCapability::default());

        Self {
            role: RoleMode::Drp,
            try_role: TryRole::None,
            vconn_supported: true,
            rp_current: RpCurrent::Default,
            capability_info: PdCapInfo::default(),
            source_capabilities,
        }
    }
}

impl Config {
    /// Build the power data objects to advertise as source.
    pub fn source_pdos(&self) -> Vec<u32, MAX_SOURCE_CAPABILITIES> {
        let info = &self.capability_info;

        self.source_capabilities
            .iter()
            .map(|capability| {
                FixedSupply::new()
                    .with_kind(info.supply_type)
                    .with_dual_role_power(info.dual_role_power)
                    .with_usb_suspend_supported(info.usb_suspend_support)
                    .with_unconstrained_power(info.externally_powered)
                    .with_usb_communications_capable(info.usb_communications_cap)
                    .with_dual_role_data(info.data_role_swap)
                    .with_peak_current(info.peak_current)
                    .with_raw_voltage(capability.raw_voltage)
                    .with_raw_max_current(capability.raw_max_current)
                    .0
            })
            .collect()
    }
}
