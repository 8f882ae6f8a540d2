//! The worker that serializes all activity of one port.
//!
//! The interrupt handler only disables the line and schedules a tick. The worker ticks the port
//! until no work is left, and enables the line again unless it is still asserted. Countdowns of
//! the port are run by the worker as well, their expiry schedules another tick.
use core::future::pending;
use core::pin::pin;

use embassy_futures::select::{Either3, select3};
use embassy_futures::yield_now;
use fusb302_pd_traits::{Board, InterruptLine, RegisterAccess};

use crate::device_policy_manager::DevicePolicyManager;
use crate::irq::IrqGate;
use crate::port::{Port, PortError, TickOutcome};
use crate::timers::{Timer, TimerSlot, TimerUpdate};

/// Drives a port from its interrupt line and countdowns.
#[derive(Debug)]
pub struct Worker<R, B, DPM, L> {
    port: Port<R, B, DPM>,
    line: L,
    gate: IrqGate,
    scheduled: bool,
    suspended: bool,
}

/// A countdown of `millis`, or one that never runs out.
async fn countdown<TIMER: Timer>(millis: Option<u32>) {
    match millis {
        Some(millis) => TIMER::after_millis(millis.into()).await,
        None => pending().await,
    }
}

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager, L: InterruptLine> Worker<R, B, DPM, L> {
    /// Create a worker with an enabled line, and a first tick scheduled.
    pub fn new(port: Port<R, B, DPM>, mut line: L) -> Self {
        let gate = IrqGate::new();
        line.set_enabled(true);

        Self {
            port,
            line,
            gate,
            scheduled: true,
            suspended: false,
        }
    }

    /// The port.
    pub fn port(&mut self) -> &mut Port<R, B, DPM> {
        &mut self.port
    }

    /// The interrupt line.
    pub fn line(&mut self) -> &mut L {
        &mut self.line
    }

    /// The interrupt enable flag.
    pub fn gate(&self) -> &IrqGate {
        &self.gate
    }

    /// Whether a tick is scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Whether the worker is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The interrupt line fired.
    pub fn interrupt(&mut self) {
        self.gate.disable(&mut self.line);
        self.scheduled = true;
    }

    /// A countdown of the port ran out.
    pub fn expire_timer(&mut self, slot: TimerSlot) {
        self.port.expire_timer(slot);
        self.scheduled = true;
    }

    /// Run a scheduled tick. Returns whether another tick is scheduled.
    ///
    /// When the port has no work left, the line is enabled again, unless it is still asserted.
    /// In that case, the next tick is scheduled right away.
    pub fn service(&mut self) -> Result<bool, PortError<R>> {
        if self.suspended || !self.scheduled {
            return Ok(false);
        }

        let outcome = self.port.tick()?;
        self.scheduled = outcome == TickOutcome::Requeue || self.line.is_asserted();

        if !self.scheduled {
            self.gate.enable(&mut self.line);
        }

        Ok(self.scheduled)
    }

    /// Stop processing events, until [`Worker::resume`].
    pub fn suspend(&mut self) {
        debug!("Suspend port worker");
        self.gate.disable(&mut self.line);
        self.suspended = true;
    }

    /// Enable the line again, and schedule a tick for what happened in the meantime.
    pub fn resume(&mut self) {
        debug!("Resume port worker");
        self.suspended = false;
        self.gate.enable(&mut self.line);
        self.scheduled = true;
    }

    /// Run the port forever, or until the register transport fails.
    ///
    /// Scheduled ticks are drained first, yielding between them. Then the worker waits for the
    /// interrupt line or either countdown.
    pub async fn run<TIMER: Timer>(&mut self) -> Result<(), PortError<R>> {
        let mut state_timer = pin!(countdown::<TIMER>(None));
        let mut mux_timer = pin!(countdown::<TIMER>(None));

        loop {
            while self.service()? {
                yield_now().await;
            }

            for (slot, timer) in [(TimerSlot::State, &mut state_timer), (TimerSlot::Mux, &mut mux_timer)] {
                match self.port.take_timer_update(slot) {
                    Some(TimerUpdate::Start(millis)) => timer.set(countdown::<TIMER>(Some(millis))),
                    Some(TimerUpdate::Stop) => timer.set(countdown::<TIMER>(None)),
                    None => {}
                }
            }

            let wake = select3(self.line.wait_for_interrupt(), state_timer.as_mut(), mux_timer.as_mut()).await;

            match wake {
                Either3::First(()) => self.interrupt(),
                Either3::Second(()) => {
                    state_timer.set(countdown::<TIMER>(None));
                    self.expire_timer(TimerSlot::State);
                }
                Either3::Third(()) => {
                    mux_timer.set(countdown::<TIMER>(None));
                    self.expire_timer(TimerSlot::Mux);
                }
            }
        }
    }
}
