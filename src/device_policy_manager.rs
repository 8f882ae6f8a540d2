//! The device policy manager (DPM) is informed about status changes of the port, and may limit
//! the power that is requested as sink.
use crate::notify::Notification;
use crate::units::{ElectricCurrent, ElectricPotential};

/// Limits of a charger behind the sink port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargerLimits {
    /// Highest voltage that the charger accepts.
    pub max_voltage: ElectricPotential,
    /// Highest current that the charger accepts.
    pub max_current: ElectricCurrent,
}

/// Trait for the device policy manager.
///
/// All methods have defaults that ignore the event.
pub trait DevicePolicyManager {
    /// A changed notification snapshot.
    fn publish(&mut self, _notification: &Notification) {}

    /// The power that was negotiated as sink.
    fn negotiated_power(&mut self, _voltage: ElectricPotential, _current: ElectricCurrent) {}

    /// An audio accessory was inserted (`true`) or removed (`false`).
    fn headphone_switch(&mut self, _inserted: bool) {}

    /// Limits for selecting a source capability as sink.
    ///
    /// Without limits, the highest capability at or below 5 V is requested.
    fn charger_limits(&mut self) -> Option<ChargerLimits> {
        None
    }
}
