//! Events that drive a tick of the port.
use core::ops::{BitOr, BitOrAssign};

use proc_bitfield::bitfield;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Events that are consumed by one tick.
    pub struct Events(pub u16): Debug, FromStorage, IntoStorage {
        /// The CC lines or VBUS changed.
        pub cc: bool @ 0,
        /// A message was received.
        pub rx: bool @ 1,
        /// A transmission finished, successfully or not.
        pub tx: bool @ 2,
        /// The partner signaled a hard reset.
        pub received_hard_reset: bool @ 3,
        /// The previous tick requested another one.
        pub work_continue: bool @ 5,
        /// The multiplexed timer expired.
        pub timer_mux: bool @ 6,
        /// The state timer expired.
        pub timer_state: bool @ 7,
        /// A CC change that was deferred during a swap.
        pub delay_cc: bool @ 8,
    }
}

impl Events {
    /// No events.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Whether no event is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether a message or a timer expiry is part of the events.
    ///
    /// States that just finished a transmission only look for a response when this holds.
    pub fn has_response_event(&self) -> bool {
        self.rx() || self.timer_mux() || self.timer_state()
    }
}

impl BitOr for Events {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_events() {
        assert!(!Events::none().has_response_event());
        assert!(!Events::none().with_tx(true).with_work_continue(true).has_response_event());
        assert!(Events::none().with_timer_mux(true).has_response_event());

        let mut events = Events::none().with_cc(true);
        events |= Events::none().with_rx(true);
        assert!(events.cc() && events.has_response_event());
    }
}
