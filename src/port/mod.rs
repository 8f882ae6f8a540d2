//! The port state machine.
//!
//! A port is driven by ticks. Every tick collects events from the chip's interrupt flags, from
//! expired countdowns and from work that the previous tick left behind, and then runs the handler
//! of the current state. Handlers may chain into the next state by requesting another tick.
mod attach;
mod events;
mod sink;
mod source;
mod state;
mod swap;
mod vdm;

#[cfg(test)]
mod tests;

pub use events::Events;
use fusb302_pd_traits::{Board, RegisterAccess};
use heapless::Vec;
pub use state::{State, VdmState};
use state::{Step, TxState};
pub use swap::Swap;
use uom::si::electric_current::milliampere;
use vdm::Vdm;

use crate::config::Config;
use crate::counters::{Counter, CounterType};
use crate::device_policy_manager::DevicePolicyManager;
use crate::notify::{Notification, Notifier, Orientation};
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType, Header, SpecificationRevision};
use crate::protocol_layer::message::{MAX_DATA_OBJECTS, Message};
use crate::tcpc::{CcRole, CcVoltage, Polarity, Tcpc};
use crate::timers::{TimerSlot, TimerState, TimerType, TimerUpdate};
use crate::units::{ElectricCurrent, ElectricPotential};
use crate::{DataRole, Error, PowerRole, RoleMode};

/// Errors of a port, for a register transport `R`.
pub type PortError<R> = Error<<R as RegisterAccess>::Error>;

/// Whether a port needs another tick right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Work is left, tick again without waiting for the interrupt line.
    Requeue,
    /// Wait for the interrupt line or a countdown.
    Done,
}

/// Sink capabilities of the partner, as seen by the local source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum PartnerSinkCapabilities {
    /// Not requested yet.
    #[default]
    Unknown,
    /// The partner did not answer the request.
    Unavailable,
    /// The received power data objects.
    Known(Vec<u32, MAX_DATA_OBJECTS>),
}

/// A USB Type-C port with USB PD, behind a FUSB302.
#[derive(Debug)]
pub struct Port<R, B, DPM> {
    tcpc: Tcpc<R, B>,
    device_policy_manager: DPM,
    config: Config,

    state: State,
    step: Step,
    tx_state: TxState,
    /// Events for the next tick.
    pending: Events,
    /// Whether the chip was reset after a sent hard reset, to resynchronize with the partner.
    hard_reset_resync: bool,

    timer_state: TimerState,
    timer_mux: TimerState,

    message_id: Counter,
    caps_counter: Counter,
    hard_reset_counter: Counter,
    debounce_counter: Counter,
    cc_sample: (CcVoltage, CcVoltage),

    vbus_begin: bool,
    is_pd_support: bool,
    try_role_complete: bool,

    /// Object position of the selected or requested capability, starting at one.
    position: u8,
    pd_output: Option<(ElectricPotential, ElectricCurrent)>,
    source_capabilities: Vec<u32, MAX_DATA_OBJECTS>,
    partner_sink_capabilities: PartnerSinkCapabilities,

    received: Message,
    staged: Message,

    vdm: Vdm,
    notifier: Notifier,
}

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    /// Create a new port. The chip is not touched until [`Port::start`].
    pub fn new(tcpc: Tcpc<R, B>, device_policy_manager: DPM, config: Config) -> Self {
        Self {
            tcpc,
            device_policy_manager,
            config,
            state: State::Unattached,
            step: Step::Entry,
            tx_state: TxState::Idle,
            pending: Events::none(),
            hard_reset_resync: false,
            timer_state: TimerState::default(),
            timer_mux: TimerState::default(),
            message_id: Counter::new(CounterType::MessageId),
            caps_counter: Counter::new(CounterType::Caps),
            hard_reset_counter: Counter::new(CounterType::HardReset),
            debounce_counter: Counter::new(CounterType::Debounce),
            cc_sample: (CcVoltage::Open, CcVoltage::Open),
            vbus_begin: false,
            is_pd_support: false,
            try_role_complete: false,
            position: 0,
            pd_output: None,
            source_capabilities: Vec::new(),
            partner_sink_capabilities: PartnerSinkCapabilities::Unknown,
            received: Message::default(),
            staged: Message::default(),
            vdm: Vdm::default(),
            notifier: Notifier::default(),
        }
    }

    /// Initialize the chip and start looking for a partner.
    pub fn start(&mut self) -> Result<(), PortError<R>> {
        info!("Start port, role {:?}", self.config.role);
        self.set_state_unattached()
    }

    /// The current state.
    pub fn port_state(&self) -> State {
        self.state
    }

    /// The current state of the DisplayPort discovery.
    pub fn vdm_state(&self) -> VdmState {
        self.vdm.state
    }

    /// The latest connector snapshot, published or not.
    pub fn notification(&self) -> &Notification {
        &self.notifier.current
    }

    /// The port controller.
    pub fn tcpc(&mut self) -> &mut Tcpc<R, B> {
        &mut self.tcpc
    }

    /// The device policy manager.
    pub fn device_policy_manager(&mut self) -> &mut DPM {
        &mut self.device_policy_manager
    }

    /// The countdown of a slot ran out. The expiry is handled by the next tick.
    pub fn expire_timer(&mut self, slot: TimerSlot) {
        self.timer(slot).expire();
    }

    /// Take the change of a countdown that the timer service has to apply.
    pub fn take_timer_update(&mut self, slot: TimerSlot) -> Option<TimerUpdate> {
        self.timer(slot).take_update()
    }

    fn timer(&mut self, slot: TimerSlot) -> &mut TimerState {
        match slot {
            TimerSlot::State => &mut self.timer_state,
            TimerSlot::Mux => &mut self.timer_mux,
        }
    }

    /// Run one step of the state machine.
    pub fn tick(&mut self) -> Result<TickOutcome, PortError<R>> {
        let mut events = self.read_alerts()?;
        self.collect_pending(&mut events);

        if !events.is_empty() {
            trace!("Tick in state {:?} with {:?}", self.state, events);

            if self.notifier.current.is_cc_connected && (events.cc() || events.delay_cc()) {
                self.try_detach()?;
            }

            if events.rx() {
                self.received = self.tcpc.receive()?;
                trace!("Received {:?}", self.received.header);

                if self.received.is_control(ControlMessageType::SoftReset) {
                    self.set_state(match self.power_role() {
                        PowerRole::Source => State::SrcSoftReset,
                        PowerRole::Sink => State::SnkSoftReset,
                    });
                }
            }

            if events.tx() && self.tx_state == TxState::Success {
                // The message ID rolls over.
                let _ = self.message_id.increment();
            }

            self.update_state(events)?;
        }

        if self.pending.is_empty() {
            Ok(TickOutcome::Done)
        } else {
            Ok(TickOutcome::Requeue)
        }
    }

    /// Decode the interrupt flags of the chip into events.
    fn read_alerts(&mut self) -> Result<Events, PortError<R>> {
        let alerts = self.tcpc.read_alerts()?;
        let mut events = Events::none();

        if alerts.interrupt.comp_chng() && self.tcpc.cc_role() != Some(CcRole::Ufp) && self.tcpc.status0()?.comp() {
            events.set_cc(true);
        }

        if alerts.interrupt.vbusok() && self.notifier.current.is_cc_connected {
            events.set_cc(true);
        }

        if alerts.interrupt_a.togdone() {
            events.set_cc(true);
            let cc_state = self.tcpc.latch_toggle_result()?;
            debug!("Toggle result {:?}", cc_state);
        }

        if alerts.interrupt_a.txsent() {
            events.set_tx(true);
            self.tx_state = TxState::Success;
        }

        if alerts.interrupt_b.gcrcsent() {
            events.set_rx(true);
        }

        if alerts.interrupt_a.hardrst() {
            info!("Hard reset received");
            self.tcpc.pd_reset()?;
            self.execute_hard_reset();
            events.set_received_hard_reset(true);
        }

        if alerts.interrupt_a.retryfail() {
            events.set_tx(true);
            self.tx_state = TxState::Failed;
        }

        if alerts.interrupt_a.hardsent() {
            if !self.hard_reset_resync {
                // Reset once more, for the partner to resynchronize after the hard reset.
                self.hard_reset_resync = true;
                self.tcpc.pd_reset()?;
                self.execute_hard_reset();
            } else {
                self.hard_reset_resync = false;
                self.tx_state = TxState::Success;
                self.timer_state.disable();
                events.set_tx(true);
            }
        }

        Ok(events)
    }

    /// Add expired countdowns and the work that the previous tick left behind.
    fn collect_pending(&mut self, events: &mut Events) {
        if self.timer_mux.take_expiry() {
            events.set_timer_mux(true);
        }

        if self.timer_state.take_expiry() {
            events.set_timer_state(true);
        }

        *events |= self.pending;
        self.pending = Events::none();
    }

    fn update_state(&mut self, events: Events) -> Result<(), PortError<R>> {
        trace!("Handle port state: {:?}", self.state);

        match self.state {
            State::Disabled => {}
            State::ErrorRecovery => self.set_state_unattached()?,
            State::Unattached => self.unattached(events)?,
            State::AttachWaitSink => self.attach_wait_sink(events)?,
            State::AttachWaitSource => self.attach_wait_source(events)?,
            State::AttachWaitAudioAccessory => self.attach_wait_audio_accessory(events)?,
            State::AttachTrySource => self.try_attach(events, RoleMode::Dfp)?,
            State::AttachTrySink => self.try_attach(events, RoleMode::Ufp)?,
            State::AttachedSource => self.attached_source()?,
            State::AttachedSink => self.attached_sink(events)?,
            State::AttachedAudioAccessory => self.attached_audio_accessory()?,

            State::SrcStartup => self.src_startup()?,
            State::SrcDiscovery => self.src_discovery(events),
            State::SrcSendCapabilities => {
                self.src_send_capabilities(events)?;

                if self.state == State::SrcNegotiateCapability {
                    self.src_negotiate_capability();
                    if self.state == State::SrcTransitionSupply {
                        self.src_transition_supply(events)?;
                    }
                }
            }
            State::SrcNegotiateCapability => {
                self.src_negotiate_capability();
                if self.state == State::SrcTransitionSupply {
                    self.src_transition_supply(events)?;
                }
            }
            State::SrcTransitionSupply => self.src_transition_supply(events)?,
            State::SrcCapabilityResponse => self.src_capability_response()?,
            State::SrcTransitionToDefault => self.src_transition_to_default(events)?,
            State::SrcReady => self.src_ready(events)?,
            State::SrcGetSinkCapabilities => self.src_get_sink_capabilities(events)?,
            State::SrcSendHardReset | State::SnkSendHardReset => self.send_hard_reset(events)?,
            State::SrcSendSoftReset => self.src_send_soft_reset(events)?,
            State::SrcSoftReset => self.src_soft_reset()?,

            State::SnkStartup => self.snk_startup()?,
            State::SnkDiscovery => self.snk_discovery(),
            State::SnkWaitForCapabilities => self.snk_wait_for_capabilities(events),
            State::SnkEvaluateCapabilities => {
                self.snk_evaluate_capabilities();
                if self.state == State::SnkSelectCapability {
                    self.snk_select_capability(events)?;
                }
            }
            State::SnkSelectCapability => self.snk_select_capability(events)?,
            State::SnkTransitionSink => self.snk_transition_sink(events),
            State::SnkTransitionToDefault => self.snk_transition_to_default(events)?,
            State::SnkReady => self.snk_ready(events)?,
            State::SnkSendSoftReset => self.snk_send_soft_reset(events)?,
            State::SnkSoftReset => self.snk_soft_reset()?,

            State::SrcPrsEvaluate | State::SnkPrsEvaluate => self.prs_evaluate(),
            State::SrcPrsAccept | State::SnkPrsAccept => self.prs_accept()?,
            State::SrcPrsReject
            | State::SnkPrsReject
            | State::VcsUfpReject
            | State::DrsDfpReject
            | State::DrsUfpReject => self.swap_reject()?,
            State::SrcPrsTransitionToOff => self.src_prs_transition_to_off(events)?,
            State::SrcPrsAssertRd => self.src_prs_assert_rd()?,
            State::SrcPrsSourceOff => self.src_prs_source_off(events)?,
            State::SrcPrsSendSwap | State::SnkPrsSendSwap => self.send_swap(events, Swap::Power)?,
            State::SnkPrsTransitionToOff => self.snk_prs_transition_to_off(events)?,
            State::SnkPrsAssertRp => self.snk_prs_assert_rp()?,
            State::SnkPrsSourceOn => self.snk_prs_source_on(events)?,

            State::VcsUfpEvaluateSwap => self.vcs_ufp_evaluate_swap(),
            State::VcsUfpAccept => self.vcs_ufp_accept()?,
            State::VcsUfpWaitForDfpVconn | State::VcsDfpWaitForUfpVconn => self.vcs_wait_for_vconn(events),
            State::VcsUfpTurnOffVconn | State::VcsDfpTurnOffVconn => self.vcs_set_vconn(false)?,
            State::VcsUfpTurnOnVconn | State::VcsDfpTurnOnVconn => self.vcs_set_vconn(true)?,
            State::VcsUfpSendPsRdy | State::VcsDfpSendPsRdy => self.vcs_send_ps_rdy()?,
            State::VcsDfpSendSwap => self.send_swap(events, Swap::Vconn)?,

            State::DrsUfpEvaluate | State::DrsDfpEvaluate => self.drs_evaluate(),
            State::DrsUfpAccept | State::DrsDfpAccept => self.drs_accept()?,
            State::DrsUfpChange | State::DrsDfpChange => self.drs_role_change()?,
            State::DrsUfpSendSwap | State::DrsDfpSendSwap => self.send_swap(events, Swap::Data)?,
        }

        Ok(())
    }

    /// Enter a new state, and request another tick for its entry actions.
    fn set_state(&mut self, state: State) {
        debug!("Port state {:?} -> {:?}", self.state, state);

        if state == State::Disabled {
            info!("PD disabled");
        }

        self.state = state;
        self.step = Step::Entry;
        self.vdm.reset_progress();
        self.request_tick();
    }

    fn request_tick(&mut self) {
        self.pending.set_work_continue(true);
    }

    /// Restart from scratch after a hard reset, in the default state of the present power role.
    fn execute_hard_reset(&mut self) {
        self.message_id.reset();
        self.vdm.state = VdmState::DiscoveryId;

        self.set_state(match self.power_role() {
            PowerRole::Source => State::SrcTransitionToDefault,
            PowerRole::Sink => State::SnkTransitionToDefault,
        });
    }

    fn power_role(&self) -> PowerRole {
        self.notifier.current.power_role
    }

    fn data_role(&self) -> DataRole {
        self.notifier.current.data_role
    }

    fn set_pd_connected(&mut self, connected: bool) {
        self.notifier.current.is_pd_connected = connected;
    }

    fn is_pd_connected(&self) -> bool {
        self.notifier.current.is_pd_connected
    }

    /// Program the roles of automatic GoodCRC replies.
    fn set_msg_header(&mut self) -> Result<(), PortError<R>> {
        self.tcpc.set_msg_header(self.power_role(), self.data_role())?;
        Ok(())
    }

    /// The state that an explicit contract idles in, for the present power role.
    fn ready_state(&self) -> State {
        match self.power_role() {
            PowerRole::Source => State::SrcReady,
            PowerRole::Sink => State::SnkReady,
        }
    }

    fn soft_reset_state(&self) -> State {
        match self.power_role() {
            PowerRole::Source => State::SrcSendSoftReset,
            PowerRole::Sink => State::SnkSendSoftReset,
        }
    }

    fn hard_reset_state(&self) -> State {
        match self.power_role() {
            PowerRole::Source => State::SrcSendHardReset,
            PowerRole::Sink => State::SnkSendHardReset,
        }
    }

    /// Reset the protocol state of a contract.
    fn soft_reset_parameters(&mut self) {
        self.caps_counter.reset();
        self.message_id.reset();
        self.vdm.state = VdmState::DiscoveryId;
        self.vdm.step = Step::Entry;
        self.vdm.reset_progress();
        self.position = 0;
    }

    fn header_template(&self) -> Header {
        Header::new_template(self.data_role(), self.power_role(), SpecificationRevision::R2_0)
    }

    /// Stage a control message for transmission.
    fn stage_control(&mut self, message_type: ControlMessageType) {
        let header = Header::new_control(self.header_template(), self.message_id, message_type);
        self.staged = Message::new(header);
        self.tx_state = TxState::Idle;
    }

    /// Stage a data message for transmission.
    fn stage_data(&mut self, message_type: DataMessageType, objects: &[u32]) {
        let header = Header::new_data(self.header_template(), self.message_id, message_type, objects.len() as u8);
        self.staged = Message::new_with_objects(header, objects);
        self.tx_state = TxState::Idle;
    }

    /// Transmit the staged message once, and report the outcome so far.
    fn send(&mut self) -> Result<TxState, PortError<R>> {
        if self.tx_state == TxState::Idle {
            trace!("Send {:?}", self.staged.header);
            self.tcpc.transmit(&self.staged)?;
            self.tx_state = TxState::Busy;
        }

        Ok(self.tx_state)
    }

    /// Stage a control message on entry of a state, and transmit it.
    fn send_control_once(&mut self, message_type: ControlMessageType) -> Result<TxState, PortError<R>> {
        if self.step == Step::Entry {
            self.stage_control(message_type);
            self.step = Step::Transmit;
        }

        self.send()
    }

    /// Signal a hard reset. Completes with the chip's report, or after the BMC timeout.
    fn send_hard_reset_signal(&mut self, events: Events) -> Result<TxState, PortError<R>> {
        match self.tx_state {
            TxState::Idle => {
                self.tcpc.send_hard_reset()?;
                self.tx_state = TxState::Busy;
                self.timer_state.start(TimerType::BmcTimeout);
            }
            _ => {
                if events.timer_state() {
                    self.tx_state = TxState::Success;
                }
            }
        }

        Ok(self.tx_state)
    }

    /// Publish the connector state to the device policy manager, if it changed.
    fn notify(&mut self) {
        let current = &mut self.notifier.current;

        if current.is_cc_connected {
            current.orientation = match self.tcpc.polarity() {
                Polarity::Cc1 => Orientation::Cc1,
                Polarity::Cc2 => Orientation::Cc2,
            };
        }

        if let Some(notification) = self.notifier.take_changed() {
            self.device_policy_manager.publish(&notification);

            if notification.power_role == PowerRole::Sink && notification.is_pd_connected {
                if let Some((voltage, current)) = self.pd_output {
                    if current.get::<milliampere>() > 0 {
                        self.device_policy_manager.negotiated_power(voltage, current);
                    }
                }
            }
        }
    }
}
