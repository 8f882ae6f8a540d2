//! Power data objects, as advertised in source and sink capabilities.
use proc_bitfield::bitfield;
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;
use uom::si::power::milliwatt;

use crate::units::{ElectricCurrent, ElectricPotential, Power};

/// Kinds of power data objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    /// Fixed voltage supply.
    FixedSupply,
    /// Battery.
    Battery,
    /// Variable voltage supply.
    VariableSupply,
    /// Augmented supply, e.g. PPS.
    Augmented,
}

impl From<u8> for Kind {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0b00 => Self::FixedSupply,
            0b01 => Self::Battery,
            0b10 => Self::VariableSupply,
            _ => Self::Augmented,
        }
    }
}

impl From<Kind> for u8 {
    fn from(value: Kind) -> Self {
        match value {
            Kind::FixedSupply => 0b00,
            Kind::Battery => 0b01,
            Kind::VariableSupply => 0b10,
            Kind::Augmented => 0b11,
        }
    }
}

/// A parsed power data object.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDataObject {
    /// Fixed voltage supply.
    FixedSupply(FixedSupply),
    /// Battery.
    Battery(Battery),
    /// Variable voltage supply.
    VariableSupply(VariableSupply),
    /// Any other kind, kept raw.
    Unknown(RawPowerDataObject),
}

impl From<u32> for PowerDataObject {
    fn from(value: u32) -> Self {
        match RawPowerDataObject(value).kind() {
            Kind::FixedSupply => Self::FixedSupply(FixedSupply(value)),
            Kind::Battery => Self::Battery(Battery(value)),
            Kind::VariableSupply => Self::VariableSupply(VariableSupply(value)),
            Kind::Augmented => Self::Unknown(RawPowerDataObject(value)),
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A power data object of unknown kind.
    pub struct RawPowerDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// The kind of object.
        pub kind: u8 [get Kind] @ 30..=31,
        /// Voltage field of fixed supplies, minimum voltage of the others, in 50 mV units.
        pub raw_voltage: u16 @ 10..=19,
        /// Current or power field, depending on the kind.
        pub raw_current: u16 @ 0..=9,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A fixed supply power data object.
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 @ 30..=31,
        /// Dual-role power
        pub dual_role_power: bool @ 29,
        /// USB suspend supported
        pub usb_suspend_supported: bool @ 28,
        /// Externally powered
        pub unconstrained_power: bool @ 27,
        /// USB communications capable
        pub usb_communications_capable: bool @ 26,
        /// Dual-role data
        pub dual_role_data: bool @ 25,
        /// Peak current
        pub peak_current: u8 @ 20..=21,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl Default for FixedSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedSupply {
    /// An empty fixed supply object.
    pub fn new() -> Self {
        Self(0)
    }

    /// The supply voltage.
    pub fn voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(u32::from(self.raw_voltage()) * 50)
    }

    /// The maximum current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(u32::from(self.raw_max_current()) * 10)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A battery power data object.
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        /// Battery
        pub kind: u8 @ 30..=31,
        /// Maximum Voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum Allowable Power in 250 mW units
        pub raw_max_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(u32::from(self.raw_max_voltage()) * 50)
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(u32::from(self.raw_min_voltage()) * 50)
    }

    /// The maximum power.
    pub fn max_power(&self) -> Power {
        Power::new::<milliwatt>(u32::from(self.raw_max_power()) * 250)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A variable supply power data object.
    pub struct VariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Variable supply (non-battery)
        pub kind: u8 @ 30..=31,
        /// Maximum Voltage in 50mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum current in 10mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl VariableSupply {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(u32::from(self.raw_max_voltage()) * 50)
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(u32::from(self.raw_min_voltage()) * 50)
    }

    /// The maximum current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(u32::from(self.raw_max_current()) * 10)
    }
}

#[cfg(test)]
mod tests {
    use uom::si::electric_current::milliampere;
    use uom::si::electric_potential::millivolt;

    use super::*;

    #[test]
    fn parse_fixed_supply() {
        // 5 V, 3 A, dual-role data.
        let pdo = PowerDataObject::from(0x0201_912c);

        let PowerDataObject::FixedSupply(fixed) = pdo else {
            panic!("expected a fixed supply, got {:?}", pdo);
        };

        assert_eq!(fixed.raw_voltage(), 100);
        assert_eq!(fixed.voltage().get::<millivolt>(), 5000);
        assert_eq!(fixed.max_current().get::<milliampere>(), 3000);
        assert!(fixed.dual_role_data());
    }

    #[test]
    fn parse_battery() {
        let raw = Battery(0).with_kind(0b01).with_raw_min_voltage(100).with_raw_max_power(40).0;
        let PowerDataObject::Battery(battery) = PowerDataObject::from(raw) else {
            panic!("expected a battery");
        };

        assert_eq!(battery.min_voltage().get::<millivolt>(), 5000);
        assert_eq!(RawPowerDataObject(raw).raw_current(), 40);
    }
}
