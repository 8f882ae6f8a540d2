//! Power role, data role and VCONN swaps.
use fusb302_pd_traits::{Board, RegisterAccess};

use super::{Events, Port, PortError, State, Step, TxState};
use crate::cc::CcPull;
use crate::device_policy_manager::DevicePolicyManager;
use crate::protocol_layer::message::header::ControlMessageType;
use crate::tcpc::CcRole;
use crate::timers::TimerType;
use crate::{DataRole, Error, PowerRole, RoleMode};

/// Kinds of swaps that the port can request from its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Swap {
    /// Exchange source and sink.
    Power,
    /// Exchange DFP and UFP.
    Data,
    /// Move the VCONN supply to this port.
    Vconn,
}

impl Swap {
    fn message_type(self) -> ControlMessageType {
        match self {
            Swap::Power => ControlMessageType::PrSwap,
            Swap::Data => ControlMessageType::DrSwap,
            Swap::Vconn => ControlMessageType::VconnSwap,
        }
    }
}

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    /// Ask the partner for a swap. Only possible while a contract is in place and idle.
    ///
    /// The request is sent on the next tick.
    pub fn request_swap(&mut self, swap: Swap) -> Result<(), PortError<R>> {
        if !self.state.is_ready() {
            return Err(Error::NotReady);
        }

        debug!("Request {:?} swap", swap);

        self.set_state(match swap {
            Swap::Power if self.is_source() => State::SrcPrsSendSwap,
            Swap::Power => State::SnkPrsSendSwap,
            Swap::Data if self.data_role() == DataRole::Dfp => State::DrsDfpSendSwap,
            Swap::Data => State::DrsUfpSendSwap,
            Swap::Vconn => State::VcsDfpSendSwap,
        });

        Ok(())
    }

    fn set_power_role(&mut self, role: PowerRole) -> Result<(), PortError<R>> {
        self.notifier.current.power_role = role;
        self.set_msg_header()
    }

    /// Enter the evaluation of a swap that the partner requested.
    pub(super) fn swap_msg_process(&mut self, events: Events) {
        if !events.rx() {
            return;
        }

        if self.received.is_control(ControlMessageType::PrSwap) {
            self.set_state(if self.is_source() {
                State::SrcPrsEvaluate
            } else {
                State::SnkPrsEvaluate
            });
        } else if self.received.is_control(ControlMessageType::VconnSwap) {
            if self.data_role() == DataRole::Dfp {
                debug!("Ignore VCONN swap as DFP");
            } else {
                self.set_state(State::VcsUfpEvaluateSwap);
            }
        } else if self.received.is_control(ControlMessageType::DrSwap) {
            self.set_state(match self.data_role() {
                DataRole::Dfp => State::DrsDfpEvaluate,
                DataRole::Ufp => State::DrsUfpEvaluate,
            });
        }
    }

    /// Send a control message, and continue in one of two states depending on the outcome.
    fn send_simple(
        &mut self,
        message_type: ControlMessageType,
        success: State,
        failed: State,
    ) -> Result<TxState, PortError<R>> {
        let tx_state = self.send_control_once(message_type)?;

        match tx_state {
            TxState::Success => self.set_state(success),
            TxState::Failed => self.set_state(failed),
            _ => {}
        }

        Ok(tx_state)
    }

    pub(super) fn prs_evaluate(&mut self) {
        let accept = self.config.role == RoleMode::Drp;

        self.set_state(match (self.state, accept) {
            (State::SrcPrsEvaluate, true) => State::SrcPrsAccept,
            (State::SrcPrsEvaluate, false) => State::SrcPrsReject,
            (_, true) => State::SnkPrsAccept,
            (_, false) => State::SnkPrsReject,
        });
    }

    pub(super) fn prs_accept(&mut self) -> Result<(), PortError<R>> {
        let source = self.is_source();
        let success = if source {
            State::SrcPrsTransitionToOff
        } else {
            State::SnkPrsTransitionToOff
        };

        let tx_state = self.send_simple(ControlMessageType::Accept, success, self.soft_reset_state())?;

        if tx_state == TxState::Success && !source {
            // The sink takes over as source, and falls back on a timeout.
            self.set_power_role(PowerRole::Source)?;
        }

        Ok(())
    }

    /// Reject a swap, and return to the ready state.
    pub(super) fn swap_reject(&mut self) -> Result<(), PortError<R>> {
        self.send_simple(ControlMessageType::Reject, self.ready_state(), self.soft_reset_state())?;
        Ok(())
    }

    pub(super) fn src_prs_transition_to_off(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step == Step::Entry {
            self.timer_state.start(TimerType::SourceTransition);
            self.step = Step::Wait;
        } else if events.timer_state() {
            self.tcpc.set_vbus(false, false);
            self.set_power_role(PowerRole::Sink)?;

            if self.config.role == RoleMode::Drp {
                self.set_state(State::SrcPrsAssertRd);
            } else {
                self.set_state(State::SrcPrsSourceOff);
            }
        }

        Ok(())
    }

    pub(super) fn src_prs_assert_rd(&mut self) -> Result<(), PortError<R>> {
        self.tcpc.set_cc_pull(CcPull::Down)?;
        self.set_state(State::SrcPrsSourceOff);
        Ok(())
    }

    /// Report the supply off, and wait for the new source.
    pub(super) fn src_prs_source_off(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            match self.send_control_once(ControlMessageType::PsRdy)? {
                TxState::Success => {
                    self.timer_state.start(TimerType::PdSourceOn);
                    self.step = Step::Wait;
                }
                TxState::Failed => {
                    self.set_power_role(PowerRole::Source)?;
                    self.set_state(State::SrcSendHardReset);
                }
                _ => {}
            }

            return Ok(());
        }

        if events.rx() {
            if self.received.is_control(ControlMessageType::PsRdy) {
                self.timer_state.disable();
                self.set_pd_connected(false);

                self.tcpc.set_cc_role(CcRole::Ufp);
                self.tcpc.set_polarity(self.tcpc.polarity())?;
                self.tcpc.set_rx_enable(true)?;
                self.set_state(State::SnkDiscovery);
            } else {
                debug!("Unexpected message while waiting for PS_RDY: {:?}", self.received.header);
            }
        } else if events.timer_state() {
            self.set_power_role(PowerRole::Source)?;
            self.set_state(State::SrcSendHardReset);
        }

        Ok(())
    }

    /// Request a swap, and follow the partner's answer.
    pub(super) fn send_swap(&mut self, events: Events, swap: Swap) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            match self.send_control_once(swap.message_type())? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.step = Step::Wait;
                }
                TxState::Failed if swap == Swap::Data => self.set_state(State::ErrorRecovery),
                TxState::Failed => self.set_state(self.soft_reset_state()),
                _ => {}
            }

            return Ok(());
        }

        if events.rx() {
            if self.received.is_control(ControlMessageType::Accept) {
                self.timer_state.disable();

                match swap {
                    Swap::Vconn => self.set_state(if self.tcpc.vconn_enabled() {
                        State::VcsDfpWaitForUfpVconn
                    } else {
                        State::VcsDfpTurnOnVconn
                    }),
                    Swap::Power => {
                        self.set_state(if self.is_source() {
                            State::SrcPrsTransitionToOff
                        } else {
                            State::SnkPrsTransitionToOff
                        });
                        self.set_power_role(PowerRole::Source)?;
                    }
                    Swap::Data => self.set_state(match self.data_role() {
                        DataRole::Dfp => State::DrsDfpChange,
                        DataRole::Ufp => State::DrsUfpChange,
                    }),
                }
            } else if self.received.is_control(ControlMessageType::Reject)
                || self.received.is_control(ControlMessageType::Wait)
            {
                self.timer_state.disable();
                self.set_state(self.ready_state());
            }
        } else if events.timer_state() {
            self.set_state(self.ready_state());
        }

        Ok(())
    }

    /// Wait for the old source to turn off.
    pub(super) fn snk_prs_transition_to_off(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step == Step::Entry {
            self.timer_state.start(TimerType::PdSourceOff);
            self.step = Step::Wait;
        }

        if events.rx() {
            if self.received.is_control(ControlMessageType::PsRdy) {
                if self.config.role == RoleMode::Drp {
                    self.set_state(State::SnkPrsAssertRp);
                } else {
                    self.set_state(State::SnkPrsSourceOn);
                }
            } else {
                debug!("Unexpected message while waiting for PS_RDY: {:?}", self.received.header);
            }
        } else if events.timer_state() {
            self.set_power_role(PowerRole::Sink)?;
            self.set_state(State::SnkSendHardReset);
        }

        Ok(())
    }

    pub(super) fn snk_prs_assert_rp(&mut self) -> Result<(), PortError<R>> {
        self.tcpc.set_cc_pull(CcPull::Up)?;
        self.set_state(State::SnkPrsSourceOn);
        Ok(())
    }

    /// Turn on the supply, report it, and start as source.
    pub(super) fn snk_prs_source_on(&mut self, events: Events) -> Result<(), PortError<R>> {
        match self.step {
            Step::Entry => {
                self.tcpc.set_vbus(true, false);
                self.step = Step::Settle;
                self.request_tick();
            }
            Step::Wait => {
                if events.timer_state() {
                    self.tcpc.set_cc_role(CcRole::Dfp);
                    self.tcpc.mask_comp_change(false)?;
                    self.set_state(State::SrcSendCapabilities);
                }
            }
            _ => {
                if self.step == Step::Settle {
                    self.stage_control(ControlMessageType::PsRdy);
                    self.step = Step::TransmitFinal;
                }

                match self.send()? {
                    TxState::Success => {
                        self.timer_state.start(TimerType::PdSwapSourceStart);
                        self.step = Step::Wait;
                    }
                    TxState::Failed => {
                        self.set_power_role(PowerRole::Sink)?;
                        self.set_state(State::SnkSendHardReset);
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    pub(super) fn vcs_ufp_evaluate_swap(&mut self) {
        if self.config.vconn_supported {
            self.set_state(State::VcsUfpAccept);
        } else {
            self.set_state(State::VcsUfpReject);
        }
    }

    pub(super) fn vcs_ufp_accept(&mut self) -> Result<(), PortError<R>> {
        let success = if self.tcpc.vconn_enabled() {
            State::VcsUfpWaitForDfpVconn
        } else {
            State::VcsUfpTurnOnVconn
        };

        self.send_simple(ControlMessageType::Accept, success, self.soft_reset_state())?;
        Ok(())
    }

    /// Wait for the partner to report its VCONN supply on.
    pub(super) fn vcs_wait_for_vconn(&mut self, events: Events) {
        if self.step == Step::Entry {
            self.timer_state.start(TimerType::PdVconnSourceOn);
            self.step = Step::Wait;
        }

        if events.rx() {
            if self.received.is_control(ControlMessageType::PsRdy) {
                self.set_state(match self.data_role() {
                    DataRole::Dfp => State::VcsDfpTurnOffVconn,
                    DataRole::Ufp => State::VcsUfpTurnOffVconn,
                });
            }
        } else if events.timer_state() {
            self.set_state(self.hard_reset_state());
        }
    }

    pub(super) fn vcs_set_vconn(&mut self, on: bool) -> Result<(), PortError<R>> {
        self.tcpc.set_vconn(on)?;

        if on {
            self.set_state(match self.data_role() {
                DataRole::Dfp => State::VcsDfpSendPsRdy,
                DataRole::Ufp => State::VcsUfpSendPsRdy,
            });
        } else {
            self.set_state(self.ready_state());
        }

        Ok(())
    }

    pub(super) fn vcs_send_ps_rdy(&mut self) -> Result<(), PortError<R>> {
        self.send_simple(ControlMessageType::PsRdy, self.ready_state(), self.soft_reset_state())?;
        Ok(())
    }

    /// Only a UFP accepts a data role swap, and only if the swap is advertised.
    pub(super) fn drs_evaluate(&mut self) {
        self.set_state(match self.data_role() {
            DataRole::Dfp => State::DrsDfpReject,
            DataRole::Ufp if self.config.capability_info.data_role_swap => State::DrsUfpAccept,
            DataRole::Ufp => State::DrsUfpReject,
        });
    }

    pub(super) fn drs_accept(&mut self) -> Result<(), PortError<R>> {
        let success = match self.data_role() {
            DataRole::Dfp => State::DrsDfpChange,
            DataRole::Ufp => State::DrsUfpChange,
        };

        self.send_simple(ControlMessageType::Accept, success, State::ErrorRecovery)?;
        Ok(())
    }

    pub(super) fn drs_role_change(&mut self) -> Result<(), PortError<R>> {
        let current = &mut self.notifier.current;
        current.data_role = match current.data_role {
            DataRole::Dfp => DataRole::Ufp,
            DataRole::Ufp => DataRole::Dfp,
        };

        info!("Data role changed to {:?}", current.data_role);
        self.set_msg_header()?;
        self.set_state(self.ready_state());
        Ok(())
    }
}
