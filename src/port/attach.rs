//! Type-C attach and detach detection.
use fusb302_pd_traits::{Board, RegisterAccess};

use super::{Events, Port, PortError, State};
use crate::counters::N_DEBOUNCE_CNT;
use crate::device_policy_manager::DevicePolicyManager;
use crate::tcpc::{CcRole, CcVoltage};
use crate::timers::TimerType;
use crate::{DataRole, PowerRole, RoleMode, TryRole};

/// Duration of the VBUS discharge after a detach, in milliseconds.
const DETACH_DISCHARGE_MS: u32 = 100;

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    /// Reinitialize the chip and toggle for a new partner.
    pub(super) fn set_state_unattached(&mut self) -> Result<(), PortError<R>> {
        info!("Connection has disconnected");

        if self.notifier.current.is_cc_connected && self.tcpc.cc_role() == Some(CcRole::AudioAccessory) {
            self.device_policy_manager.headphone_switch(false);
        }

        self.tcpc.init(self.config.rp_current)?;
        self.tcpc.set_rx_enable(false)?;
        self.set_state(State::Unattached);
        self.tcpc.set_cc(self.config.role)?;

        self.notifier.clear();
        self.notify();

        let board = self.tcpc.board();
        board.set_discharge(true);
        board.delay_ms(DETACH_DISCHARGE_MS);
        board.set_discharge(false);

        self.tcpc.mask_comp_change(true)?;
        self.try_role_complete = false;

        Ok(())
    }

    /// Check whether the partner is still attached, after a CC or VBUS change.
    pub(super) fn try_detach(&mut self) -> Result<(), PortError<R>> {
        let role = self.tcpc.cc_role();

        if role == Some(CcRole::AudioAccessory) {
            if self.tcpc.get_cc()? != (CcVoltage::Ra, CcVoltage::Ra) {
                self.set_state_unattached()?;
            }
        } else if role == Some(CcRole::Ufp)
            && !matches!(
                self.state,
                State::SnkTransitionToDefault
                    | State::SrcPrsSourceOff
                    | State::SnkPrsSendSwap
                    | State::SnkPrsAssertRp
                    | State::SnkPrsSourceOn
                    | State::SnkPrsTransitionToOff
            )
        {
            if !self.tcpc.check_vbus()? {
                self.set_state_unattached()?;
            }
        } else if !matches!(
            self.state,
            State::SrcTransitionToDefault | State::SrcPrsSourceOff | State::SnkPrsSourceOn
        ) {
            let (cc1, cc2) = self.tcpc.get_cc()?;
            let on_cc2 = self.tcpc.cc_state().is_some_and(|state| state.on_cc2);
            let active = if on_cc2 { cc2 } else { cc1 };

            if active == CcVoltage::Open {
                self.set_state_unattached()?;
            }
        } else {
            // Swaps change the terminations, check again once they are done.
            self.pending.set_delay_cc(true);
        }

        Ok(())
    }

    /// Take a new sample of both lines. Returns whether the lines were stable for long enough.
    fn debounce_cc(&mut self) -> Result<bool, PortError<R>> {
        let sample = self.tcpc.get_cc()?;

        if sample == self.cc_sample {
            let _ = self.debounce_counter.increment();
        } else {
            self.cc_sample = sample;
            self.debounce_counter.reset();
        }

        Ok(self.debounce_counter.value() > N_DEBOUNCE_CNT)
    }

    /// Start debouncing the lines of a fresh toggle result.
    fn start_debounce(&mut self) -> Result<(), PortError<R>> {
        if let Some(cc_state) = self.tcpc.cc_state() {
            self.tcpc.set_polarity(cc_state.polarity())?;
        }

        self.cc_sample = self.tcpc.get_cc()?;
        self.debounce_counter.reset();
        self.timer_mux.start(TimerType::CcDebounce);

        Ok(())
    }

    fn try_source_first(&self) -> bool {
        self.config.role == RoleMode::Drp && self.config.try_role == TryRole::Source && !self.try_role_complete
    }

    pub(super) fn unattached(&mut self, events: Events) -> Result<(), PortError<R>> {
        self.notifier.current.is_cc_connected = false;
        self.is_pd_support = false;

        let Some(cc_state) = self.tcpc.cc_state() else {
            return Ok(());
        };

        if events.cc() {
            self.set_state(match cc_state.role {
                CcRole::Ufp => State::AttachWaitSink,
                CcRole::Dfp => State::AttachWaitSource,
                CcRole::AudioAccessory => State::AttachWaitAudioAccessory,
            });

            self.vbus_begin = self.tcpc.check_vbus()?;
            self.start_debounce()?;
        }

        Ok(())
    }

    /// Present a single role for a Try.SRC or Try.SNK attempt.
    fn try_attach_set(&mut self, mode: RoleMode) -> Result<(), PortError<R>> {
        let state = match mode {
            RoleMode::Dfp => State::AttachTrySource,
            RoleMode::Ufp => State::AttachTrySink,
            RoleMode::Drp => return Ok(()),
        };

        self.tcpc.init(self.config.rp_current)?;
        self.tcpc.set_cc(mode)?;
        self.timer_mux.start(TimerType::PdTryDrp);
        self.set_state(state);

        Ok(())
    }

    pub(super) fn attach_wait_sink(&mut self, events: Events) -> Result<(), PortError<R>> {
        if !events.timer_mux() {
            return Ok(());
        }

        if self.tcpc.check_vbus()? {
            self.timer_mux.disable();

            if self.try_source_first() {
                return self.try_attach_set(RoleMode::Dfp);
            } else if self.try_role_complete {
                self.timer_mux.start(TimerType::PdSourceOn);
                self.set_state(State::AttachedSink);
                return Ok(());
            }
        }

        if self.debounce_cc()? {
            self.timer_mux.disable();

            if matches!(
                self.cc_sample,
                (CcVoltage::Rp, CcVoltage::Open) | (CcVoltage::Open, CcVoltage::Rp)
            ) {
                self.timer_mux.start(TimerType::PdSourceOn);
                self.set_state(State::AttachedSink);
            } else {
                self.set_state_unattached()?;
            }

            return Ok(());
        }

        self.timer_mux.start(TimerType::CcDebounce);
        Ok(())
    }

    pub(super) fn attach_wait_source(&mut self, events: Events) -> Result<(), PortError<R>> {
        if !events.timer_mux() {
            return Ok(());
        }

        if self.debounce_cc()? {
            let (cc1, cc2) = self.cc_sample;
            let one_open = cc1 == CcVoltage::Open || cc2 == CcVoltage::Open;
            let one_rd = cc1 == CcVoltage::Rd || cc2 == CcVoltage::Rd;

            if one_open && one_rd {
                if self.config.role == RoleMode::Drp
                    && self.config.try_role == TryRole::Sink
                    && !self.try_role_complete
                {
                    self.try_attach_set(RoleMode::Ufp)?;
                } else {
                    self.set_state(State::AttachedSource);
                }
            } else {
                self.set_state_unattached()?;
            }

            return Ok(());
        }

        self.timer_mux.start(TimerType::CcDebounce);
        Ok(())
    }

    pub(super) fn attached_source(&mut self) -> Result<(), PortError<R>> {
        self.tcpc.set_vbus(true, false);
        if let Some(cc_state) = self.tcpc.cc_state() {
            self.tcpc.set_polarity(cc_state.polarity())?;
        }
        self.tcpc.set_vconn(true)?;

        let current = &mut self.notifier.current;
        current.is_cc_connected = true;
        current.power_role = PowerRole::Source;
        current.data_role = DataRole::Dfp;

        self.hard_reset_counter.reset();
        self.set_state(State::SrcStartup);
        self.tcpc.mask_comp_change(false)?;

        info!("CC connected on {:?} as DFP", self.tcpc.polarity());
        Ok(())
    }

    pub(super) fn attached_sink(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.tcpc.check_vbus()? {
            self.timer_mux.disable();
            self.timer_state.disable();

            if self.try_source_first() {
                return self.try_attach_set(RoleMode::Dfp);
            }

            self.try_role_complete = true;

            let current = &mut self.notifier.current;
            current.is_cc_connected = true;
            current.power_role = PowerRole::Sink;
            current.data_role = DataRole::Ufp;

            self.hard_reset_counter.reset();
            self.set_state(State::SnkStartup);

            info!("CC connected on {:?} as UFP", self.tcpc.polarity());
            return Ok(());
        } else if events.timer_mux() {
            return self.set_state_unattached();
        }

        // Poll VBUS until the source turns it on.
        self.timer_state.start(TimerType::CcDebounce);
        Ok(())
    }

    /// Try.SRC or Try.SNK, presenting only the role of `mode`.
    pub(super) fn try_attach(&mut self, events: Events, mode: RoleMode) -> Result<(), PortError<R>> {
        let cc_state = self.tcpc.cc_state();

        if let (true, Some(cc_state)) = (events.cc(), cc_state) {
            self.try_role_complete = true;

            self.set_state(match (cc_state.role, mode) {
                (CcRole::Ufp, RoleMode::Ufp) => State::AttachWaitSink,
                (CcRole::Ufp, _) => State::ErrorRecovery,
                (_, RoleMode::Dfp) => State::AttachWaitSource,
                _ => State::ErrorRecovery,
            });

            self.start_debounce()?;
        } else if events.timer_mux() {
            if !self.try_role_complete {
                self.try_role_complete = true;
                self.try_attach_set(match mode {
                    RoleMode::Dfp => RoleMode::Ufp,
                    _ => RoleMode::Dfp,
                })?;
            } else {
                self.set_state(State::ErrorRecovery);
            }
        }

        Ok(())
    }

    pub(super) fn attach_wait_audio_accessory(&mut self, events: Events) -> Result<(), PortError<R>> {
        if !events.timer_mux() {
            return Ok(());
        }

        if self.debounce_cc()? {
            if self.cc_sample == (CcVoltage::Ra, CcVoltage::Ra) {
                self.set_state(State::AttachedAudioAccessory);
            } else {
                warn!("Unknown accessory, cc {:?}", self.cc_sample);
                return self.set_state_unattached();
            }
        }

        self.timer_mux.start(TimerType::CcDebounce);
        Ok(())
    }

    pub(super) fn attached_audio_accessory(&mut self) -> Result<(), PortError<R>> {
        if let Some(cc_state) = self.tcpc.cc_state() {
            self.tcpc.set_polarity(cc_state.polarity())?;
        }

        self.notifier.current.is_cc_connected = true;
        self.hard_reset_counter.reset();
        self.set_state(State::Disabled);
        self.tcpc.mask_comp_change(false)?;

        info!("CC connected as audio accessory");
        self.device_policy_manager.headphone_switch(true);
        Ok(())
    }
}
