//! Definitions of request message content.
use proc_bitfield::bitfield;
use uom::si::electric_current::milliampere;

use crate::units::ElectricCurrent;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Request data object for fixed and variable supplies.
    pub struct FixedVariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=31,
        /// GiveBack supported
        pub giveback_flag: bool @ 27,
        /// Capability mismatch
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating current in 10 mA units
        pub raw_operating_current: u16 @ 10..=19,
        /// Maximum operating current in 10 mA units
        pub raw_max_operating_current: u16 @ 0..=9,
    }
}

impl FixedVariableSupply {
    /// The operating current.
    pub fn operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(u32::from(self.raw_operating_current()) * 10)
    }

    /// The maximum operating current.
    pub fn max_operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(u32::from(self.raw_max_operating_current()) * 10)
    }
}
