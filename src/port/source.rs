//! Policy states of the source.
use fusb302_pd_traits::{Board, RegisterAccess};

use super::{Events, PartnerSinkCapabilities, Port, PortError, State, Step, TxState};
use crate::counters::{N_CAPS_COUNT, N_HARDRESET_COUNT};
use crate::device_policy_manager::DevicePolicyManager;
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType};
use crate::protocol_layer::message::request::FixedVariableSupply;
use crate::protocol_layer::message::vendor_defined::VdmHeaderStructured;
use crate::timers::TimerType;
use crate::PowerRole;

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    /// Common entry of source and sink policy: reset the contract and enable the receiver.
    pub(super) fn policy_startup(&mut self, next: State) -> Result<(), PortError<R>> {
        self.set_pd_connected(false);
        self.soft_reset_parameters();
        self.partner_sink_capabilities = PartnerSinkCapabilities::Unknown;

        self.set_msg_header()?;
        self.tcpc.set_polarity(self.tcpc.polarity())?;
        self.tcpc.set_rx_enable(true)?;

        self.set_state(next);
        self.notify();
        Ok(())
    }

    pub(super) fn src_startup(&mut self) -> Result<(), PortError<R>> {
        self.policy_startup(State::SrcSendCapabilities)
    }

    /// What to do when no partner answered for too long.
    fn src_no_response(&mut self) {
        if !self.is_pd_support {
            self.set_state(State::Disabled);
        } else if self.hard_reset_counter.value() > N_HARDRESET_COUNT {
            self.set_state(State::ErrorRecovery);
        } else {
            self.set_state(State::SrcSendHardReset);
        }
    }

    pub(super) fn src_discovery(&mut self, events: Events) {
        if self.step == Step::Entry {
            let _ = self.caps_counter.increment();

            if self.caps_counter.value() < N_CAPS_COUNT {
                self.timer_state.start(TimerType::TypeCSendSourceCap);
                self.step = Step::Wait;
            } else {
                self.set_state(State::Disabled);
            }
        } else if events.timer_state() {
            self.set_state(State::SrcSendCapabilities);
        } else if events.timer_mux() {
            self.src_no_response();
        }
    }

    pub(super) fn src_send_capabilities(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            if self.step == Step::Entry {
                let pdos = self.config.source_pdos();
                self.stage_data(DataMessageType::SourceCapabilities, &pdos);
                self.step = Step::Transmit;
            }

            match self.send()? {
                TxState::Success => {
                    self.hard_reset_counter.reset();
                    self.caps_counter.reset();
                    self.timer_state.start(TimerType::SenderResponse);
                    self.timer_mux.disable();
                    self.step = Step::Wait;
                    self.is_pd_support = true;
                }
                TxState::Failed => {
                    self.set_state(State::SrcDiscovery);
                    return Ok(());
                }
                _ => {}
            }

            if !events.has_response_event() {
                return Ok(());
            }
        }

        if events.rx() {
            if self.received.is_data(DataMessageType::Request) {
                self.set_state(State::SrcNegotiateCapability);
            } else {
                self.set_state(State::SrcSendSoftReset);
            }
        } else if events.timer_state() {
            if self.hard_reset_counter.value() <= N_HARDRESET_COUNT {
                self.set_state(State::SrcSendHardReset);
            } else {
                self.set_state(State::Disabled);
            }
        } else if events.timer_mux() {
            self.src_no_response();
        }

        Ok(())
    }

    /// Accept the request if it points at an advertised capability.
    pub(super) fn src_negotiate_capability(&mut self) {
        let request = FixedVariableSupply(self.received.object(0));
        let position = usize::from(request.object_position());

        if position == 0 || position > self.config.source_capabilities.len() {
            self.set_state(State::SrcCapabilityResponse);
        } else {
            self.set_state(State::SrcTransitionSupply);
        }
    }

    pub(super) fn src_transition_supply(&mut self, events: Events) -> Result<(), PortError<R>> {
        match self.step {
            Step::Entry | Step::Transmit => match self.send_control_once(ControlMessageType::Accept)? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SourceTransition);
                    self.step = Step::Settle;
                }
                TxState::Failed => self.set_state(State::SrcSendSoftReset),
                _ => {}
            },
            Step::Settle => {
                if events.timer_state() {
                    self.set_pd_connected(true);
                    self.tcpc.set_vbus(true, false);
                    self.stage_control(ControlMessageType::PsRdy);
                    self.step = Step::TransmitFinal;
                    self.request_tick();
                }
            }
            Step::TransmitFinal | Step::Wait => match self.send()? {
                TxState::Success => {
                    info!("PD connected as DFP, supplying 5 V");
                    self.set_state(State::SrcReady);
                }
                TxState::Failed => self.set_state(State::SrcSendSoftReset),
                _ => {}
            },
        }

        Ok(())
    }

    /// Reject an invalid request.
    pub(super) fn src_capability_response(&mut self) -> Result<(), PortError<R>> {
        match self.send_control_once(ControlMessageType::Reject)? {
            TxState::Success => {
                if self.is_pd_connected() {
                    info!("PD connected as DFP, supplying 5 V");
                    self.set_state(State::SrcReady);
                } else {
                    self.set_state(State::SrcSendHardReset);
                }
            }
            TxState::Failed => self.set_state(State::SrcSendSoftReset),
            _ => {}
        }

        Ok(())
    }

    pub(super) fn src_transition_to_default(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step == Step::Entry {
            self.set_pd_connected(false);
            self.tcpc.set_vbus(false, false);
            self.tcpc.set_data_role_bit(self.data_role())?;

            self.timer_state.start(TimerType::SourceRecover);
            self.step = Step::Wait;
        } else if events.timer_state() {
            self.tcpc.set_vbus(true, false);
            self.timer_mux.start(TimerType::NoResponse);
            self.set_state(State::SrcStartup);
            debug!("Hard reset over, source startup");
        }

        Ok(())
    }

    /// Handle a received VDM while a contract is in place.
    pub(super) fn ready_receive(&mut self, events: Events) {
        if !events.rx() {
            return;
        }

        if self.received.is_data(DataMessageType::VendorDefined) {
            self.process_vdm();
            self.request_tick();
            self.timer_state.disable();
        } else if !self.vdm_active() {
            self.swap_msg_process(events);
        }
    }

    pub(super) fn src_ready(&mut self, events: Events) -> Result<(), PortError<R>> {
        self.ready_receive(events);

        if self.state != State::SrcReady {
            return Ok(());
        }

        if self.partner_sink_capabilities == PartnerSinkCapabilities::Unknown {
            self.set_state(State::SrcGetSinkCapabilities);
        } else if self.vdm_active() {
            self.auto_vdm(events)?;
        }

        Ok(())
    }

    pub(super) fn src_get_sink_capabilities(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            match self.send_control_once(ControlMessageType::GetSinkCap)? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.step = Step::Wait;
                }
                TxState::Failed => {
                    self.set_state(State::SrcSendSoftReset);
                    return Ok(());
                }
                _ => {}
            }

            if !events.has_response_event() {
                return Ok(());
            }
        }

        if events.rx() {
            if self.received.is_data(DataMessageType::SinkCapabilities) {
                self.partner_sink_capabilities = PartnerSinkCapabilities::Known(self.received.objects.clone());
            } else {
                self.partner_sink_capabilities = PartnerSinkCapabilities::Unavailable;
            }
            self.set_state(State::SrcReady);
        } else if events.timer_state() {
            warn!("Get sink capabilities timed out");
            self.partner_sink_capabilities = PartnerSinkCapabilities::Unavailable;
            self.set_state(State::SrcReady);
        }

        Ok(())
    }

    /// Signal a hard reset, and continue in the default state of the present power role.
    pub(super) fn send_hard_reset(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step == Step::Entry {
            self.tx_state = TxState::Idle;
            self.step = Step::Transmit;
        }

        match self.send_hard_reset_signal(events)? {
            TxState::Success => {
                // Saturates one above the limit, which marks it as exceeded.
                if self.hard_reset_counter.value() <= N_HARDRESET_COUNT {
                    let _ = self.hard_reset_counter.increment();
                }

                self.set_state(match self.state {
                    State::SrcSendHardReset => State::SrcTransitionToDefault,
                    _ => State::SnkTransitionToDefault,
                });
            }
            TxState::Failed => self.set_state(State::ErrorRecovery),
            _ => {}
        }

        Ok(())
    }

    /// Accept a soft reset of the partner.
    pub(super) fn src_soft_reset(&mut self) -> Result<(), PortError<R>> {
        match self.send_control_once(ControlMessageType::Accept)? {
            TxState::Success => {
                self.soft_reset_parameters();
                self.set_state(State::SrcSendCapabilities);
            }
            TxState::Failed => self.set_state(State::SrcSendHardReset),
            _ => {}
        }

        Ok(())
    }

    pub(super) fn src_send_soft_reset(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            match self.send_control_once(ControlMessageType::SoftReset)? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.step = Step::Wait;
                }
                TxState::Failed => {
                    self.set_state(State::SrcSendHardReset);
                    return Ok(());
                }
                _ => {}
            }

            if !events.has_response_event() {
                return Ok(());
            }
        }

        if events.rx() {
            if self.received.is_control(ControlMessageType::Accept) {
                self.soft_reset_parameters();
                self.set_state(State::SrcSendCapabilities);
            }
        } else if events.timer_state() {
            self.set_state(State::SrcSendHardReset);
        }

        Ok(())
    }

    /// Whether the DisplayPort discovery runs, which is the case as DFP until it settles.
    pub(super) fn vdm_active(&self) -> bool {
        self.data_role() == crate::DataRole::Dfp && self.vdm.state.is_pending()
    }

    /// The header of the last received VDM.
    pub(super) fn received_vdm_header(&self) -> VdmHeaderStructured {
        VdmHeaderStructured(self.received.object(0))
    }

    /// Whether the port is the source of power.
    pub(super) fn is_source(&self) -> bool {
        self.power_role() == PowerRole::Source
    }
}
