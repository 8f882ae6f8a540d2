//! The interrupt enable flag, shared between the interrupt handler and the worker.
use core::sync::atomic::{AtomicBool, Ordering};

use fusb302_pd_traits::InterruptLine;

/// Tracks whether the interrupt line of a port is enabled.
///
/// The interrupt handler disables the line and schedules a tick. The worker enables it again
/// when a tick finished without pending work.
#[derive(Debug)]
pub struct IrqGate {
    enabled: AtomicBool,
}

impl Default for IrqGate {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGate {
    /// A gate with an enabled line.
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    /// Whether the line is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disable the line. Returns `false` if it was already disabled.
    pub fn disable<L: InterruptLine>(&self, line: &mut L) -> bool {
        if self.enabled.swap(false, Ordering::AcqRel) {
            line.set_enabled(false);
            true
        } else {
            warn!("IRQ already disabled");
            false
        }
    }

    /// Enable the line. Returns `false` if it was already enabled.
    pub fn enable<L: InterruptLine>(&self, line: &mut L) -> bool {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            line.set_enabled(true);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::DummyLine;

    #[test]
    fn disable_and_enable_once() {
        let gate = IrqGate::new();
        let mut line = DummyLine::default();

        assert!(gate.disable(&mut line));
        assert!(!gate.disable(&mut line));
        assert!(!gate.is_enabled());
        assert_eq!(line.set_enabled_calls, 1);

        assert!(gate.enable(&mut line));
        assert!(!gate.enable(&mut line));
        assert!(gate.is_enabled());
        assert!(line.enabled);
        assert_eq!(line.set_enabled_calls, 2);
    }
}
