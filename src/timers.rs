//! Timers that are used by the port state machine.
//!
//! Every port owns two independent single-shot countdowns, the state timer and the multiplexed
//! timer. Arming a countdown replaces its previous deadline. An expiry only raises an event, that
//! is consumed by the next tick of the port.
use core::future::Future;

use heapless::LinearMap;

/// The timer trait to implement by the user application.
pub trait Timer {
    /// Expire after the specified number of milliseconds.
    fn after_millis(milliseconds: u64) -> impl Future<Output = ()>;
}

/// Types of timers that are used for timeouts.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerType {
    /// Poll interval while debouncing the CC lines.
    CcDebounce,
    NoResponse,
    SourceRecover,
    TypeCSendSourceCap,
    SenderResponse,
    SourceTransition,
    TypeCSinkWaitCap,
    PsTransition,
    BmcTimeout,
    PsHardResetMax,
    Safe0V,
    SourceTurnOn,
    SourceRecoverMax,
    PdSourceOff,
    PdSourceOn,
    PdSwapSourceStart,
    PdVconnSourceOn,
    PdTryDrp,
    /// Wait for VBUS to drop after a hard reset, then for its recovery.
    HardResetVbusOff,
    HardResetVbusOn,
}

impl TimerType {
    /// The duration in milliseconds, as given by the USB PD and Type-C specifications.
    pub fn millis(self) -> u32 {
        match self {
            TimerType::CcDebounce => 2,
            TimerType::NoResponse => 5000,
            TimerType::SourceRecover => 830,
            TimerType::TypeCSendSourceCap => 100,
            TimerType::SenderResponse => 30,
            TimerType::SourceTransition => 30,
            TimerType::TypeCSinkWaitCap => 500,
            TimerType::PsTransition => 500,
            TimerType::BmcTimeout => 5,
            TimerType::PsHardResetMax => 35,
            TimerType::Safe0V => 650,
            TimerType::SourceTurnOn => 275,
            TimerType::SourceRecoverMax => 1000,
            TimerType::PdSourceOff => 920,
            TimerType::PdSourceOn => 480,
            TimerType::PdSwapSourceStart => 20,
            TimerType::PdVconnSourceOn => 100,
            TimerType::PdTryDrp => 75,
            TimerType::HardResetVbusOff => TimerType::PsHardResetMax.millis() + TimerType::Safe0V.millis(),
            TimerType::HardResetVbusOn => TimerType::SourceRecoverMax.millis() + TimerType::SourceTurnOn.millis(),
        }
    }
}

/// The two countdowns of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerSlot {
    /// Timeouts of the current state.
    State,
    /// Debounce polling and long running supervision.
    Mux,
}

/// State of a single countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Countdown {
    /// Not running.
    #[default]
    Disabled,
    /// Running, with the given duration in milliseconds.
    Armed(u32),
    /// Ran out, the expiry event was not consumed yet.
    Expired,
}

/// A change of a countdown, for the timer service to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerUpdate {
    /// (Re)start with the given duration in milliseconds.
    Start(u32),
    /// Stop the timer, a pending expiry is void.
    Stop,
}

/// A countdown together with the change that was not yet picked up by the timer service.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TimerState {
    countdown: Countdown,
    update: Option<TimerUpdate>,
}

impl TimerState {
    pub(crate) fn start(&mut self, timer_type: TimerType) {
        let millis = timer_type.millis();
        self.countdown = Countdown::Armed(millis);
        self.update = Some(TimerUpdate::Start(millis));
    }

    pub(crate) fn disable(&mut self) {
        if self.countdown != Countdown::Disabled {
            self.update = Some(TimerUpdate::Stop);
        }
        self.countdown = Countdown::Disabled;
    }

    /// Mark as expired. Expiry of a stopped timer is ignored.
    pub(crate) fn expire(&mut self) {
        if let Countdown::Armed(_) = self.countdown {
            self.countdown = Countdown::Expired;
        }
    }

    /// Consume a pending expiry, returning whether there was one.
    pub(crate) fn take_expiry(&mut self) -> bool {
        if self.countdown == Countdown::Expired {
            self.countdown = Countdown::Disabled;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn countdown(&self) -> Countdown {
        self.countdown
    }

    pub(crate) fn take_update(&mut self) -> Option<TimerUpdate> {
        self.update.take()
    }
}

/// Identifies a port within a controller.
pub type PortId = u8;

/// Identifies a platform timer.
pub type TimerHandle = u8;

/// Errors of the timer registry.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// No space for another timer.
    #[error("timer registry is full")]
    Full,
    /// The handle is already registered.
    #[error("timer handle `{0}` is already registered")]
    Duplicate(TimerHandle),
}

/// Maps platform timer handles to the port and countdown they drive.
///
/// Filled once while setting up the ports, and only read when a timer fires.
#[derive(Debug, Default)]
pub struct TimerRegistry<const N: usize> {
    entries: LinearMap<TimerHandle, (PortId, TimerSlot), N>,
}

impl<const N: usize> TimerRegistry<N> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: LinearMap::new(),
        }
    }

    /// Register a timer handle for a port's countdown.
    pub fn register(&mut self, handle: TimerHandle, port: PortId, slot: TimerSlot) -> Result<(), RegistryError> {
        if self.entries.contains_key(&handle) {
            return Err(RegistryError::Duplicate(handle));
        }

        self.entries
            .insert(handle, (port, slot))
            .map(|_| ())
            .map_err(|_| RegistryError::Full)
    }

    /// Find the port and countdown of a fired timer.
    pub fn lookup(&self, handle: TimerHandle) -> Option<(PortId, TimerSlot)> {
        self.entries.get(&handle).copied()
    }

    /// Find the timer handle of a port's countdown.
    pub fn handle_of(&self, port: PortId, slot: TimerSlot) -> Option<TimerHandle> {
        self.entries
            .iter()
            .find(|(_, entry)| **entry == (port, slot))
            .map(|(handle, _)| *handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_replaces_the_deadline() {
        let mut timer = TimerState::default();

        timer.start(TimerType::SenderResponse);
        timer.start(TimerType::PsTransition);

        assert_eq!(timer.countdown(), Countdown::Armed(500));
        assert_eq!(timer.take_update(), Some(TimerUpdate::Start(500)));
        assert_eq!(timer.take_update(), None);
    }

    #[test]
    fn expiry_after_disable_is_void() {
        let mut timer = TimerState::default();

        timer.start(TimerType::SenderResponse);
        timer.disable();
        timer.expire();

        assert!(!timer.take_expiry());
        assert_eq!(timer.take_update(), Some(TimerUpdate::Stop));
    }

    #[test]
    fn expiry_is_consumed_once() {
        let mut timer = TimerState::default();

        timer.start(TimerType::CcDebounce);
        timer.expire();

        assert!(timer.take_expiry());
        assert!(!timer.take_expiry());
        assert_eq!(timer.countdown(), Countdown::Disabled);
    }

    #[test]
    fn hard_reset_windows() {
        assert_eq!(TimerType::HardResetVbusOff.millis(), 685);
        assert_eq!(TimerType::HardResetVbusOn.millis(), 1275);
    }

    #[test]
    fn registry_lookup() {
        let mut registry: TimerRegistry<4> = TimerRegistry::new();

        registry.register(10, 0, TimerSlot::State).unwrap();
        registry.register(11, 0, TimerSlot::Mux).unwrap();
        registry.register(12, 1, TimerSlot::State).unwrap();

        assert_eq!(registry.lookup(11), Some((0, TimerSlot::Mux)));
        assert_eq!(registry.lookup(13), None);
        assert_eq!(registry.handle_of(1, TimerSlot::State), Some(12));
        assert_eq!(registry.register(10, 1, TimerSlot::Mux), Err(RegistryError::Duplicate(10)));

        registry.register(13, 1, TimerSlot::Mux).unwrap();
        assert_eq!(registry.register(14, 2, TimerSlot::State), Err(RegistryError::Full));
    }
}
