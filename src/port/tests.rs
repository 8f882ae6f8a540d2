//! Tests for the port state machine, against a simulated chip.

use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;

use super::{Port, State, Swap, TickOutcome, VdmState};
use crate::config::Config;
use crate::counters::{Counter, CounterType, N_DEBOUNCE_CNT};
use crate::dummy::{DummyBoard, DummyPolicyManager, DummyRegisters, Termination, TxResponse};
use crate::protocol_layer::message::Message;
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType, Header, SpecificationRevision};
use crate::protocol_layer::message::pdo::FixedSupply;
use crate::protocol_layer::message::request::FixedVariableSupply;
use crate::protocol_layer::message::vendor_defined::{
    DISPLAYPORT_SID, DisplayPortCapabilities, DisplayPortConfig, DisplayPortStatus, PD_SID, VdmCommand,
    VdmCommandType, VdmHeaderStructured, pin,
};
use crate::tcpc::Tcpc;
use crate::timers::TimerSlot;
use crate::{DataRole, Error, PowerRole};

type TestPort = Port<DummyRegisters, DummyBoard, DummyPolicyManager>;

fn new_port() -> TestPort {
    let tcpc = Tcpc::new(DummyRegisters::new(), DummyBoard::default());
    let mut port = Port::new(tcpc, DummyPolicyManager::default(), Config::default());

    port.start().unwrap();
    settle(&mut port);
    port
}

fn registers(port: &mut TestPort) -> &mut DummyRegisters {
    port.tcpc().registers()
}

/// Tick until no work and no interrupt flag is left, like the worker does.
fn settle(port: &mut TestPort) {
    for _ in 0..100 {
        let outcome = port.tick().unwrap();

        if outcome == TickOutcome::Done && !registers(port).has_interrupt() {
            return;
        }
    }

    panic!("port does not settle in {:?}", port.port_state());
}

fn expire(port: &mut TestPort, slot: TimerSlot) {
    port.expire_timer(slot);
    settle(port);
}

fn debounce(port: &mut TestPort) {
    for _ in 0..=N_DEBOUNCE_CNT {
        expire(port, TimerSlot::Mux);
    }
}

fn from_source() -> Header {
    Header::new_template(DataRole::Dfp, PowerRole::Source, SpecificationRevision::R2_0)
}

fn from_sink() -> Header {
    Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R2_0)
}

fn control(template: Header, message_type: ControlMessageType) -> Message {
    Message::new(Header::new_control(
        template,
        Counter::new(CounterType::MessageId),
        message_type,
    ))
}

fn data(template: Header, message_type: DataMessageType, objects: &[u32]) -> Message {
    let header = Header::new_data(
        template,
        Counter::new(CounterType::MessageId),
        message_type,
        objects.len() as u8,
    );
    Message::new_with_objects(header, objects)
}

fn vdm(svid: u16, command: VdmCommand, command_type: VdmCommandType, objects: &[u32]) -> Message {
    let header = VdmHeaderStructured::request(svid, 0, command).with_command_type(command_type);

    let mut payload = vec![header.0];
    payload.extend_from_slice(objects);
    data(from_sink(), DataMessageType::VendorDefined, &payload)
}

fn receive(port: &mut TestPort, message: Message) {
    registers(port).inject_message(&message);
    settle(port);
}

fn fixed_5v(raw_max_current: u16) -> u32 {
    FixedSupply::new()
        .with_raw_voltage(100)
        .with_raw_max_current(raw_max_current)
        .0
}

fn last_transmitted(port: &mut TestPort) -> Message {
    registers(port).last_transmitted().cloned().expect("nothing was transmitted")
}

fn last_vdm_command(port: &mut TestPort) -> VdmCommand {
    let message = last_transmitted(port);
    assert!(message.is_data(DataMessageType::VendorDefined));
    VdmHeaderStructured(message.object(0)).command()
}

/// Attach a source with VBUS present, up to waiting for its capabilities.
fn attach_to_source(port: &mut TestPort) {
    let chip = registers(port);
    chip.partner = [Termination::Rp, Termination::Open];
    chip.set_vbus(true);
    chip.toggle_done(0b101);

    settle(port);
    assert_eq!(port.port_state(), State::AttachWaitSink);

    debounce(port);
    assert_eq!(port.port_state(), State::SnkWaitForCapabilities);
}

/// Attach a sink on CC1, up to the first capabilities.
fn attach_to_sink(port: &mut TestPort) {
    let chip = registers(port);
    chip.partner = [Termination::Rd, Termination::Open];
    chip.toggle_done(0b001);

    settle(port);
    assert_eq!(port.port_state(), State::AttachWaitSource);

    debounce(port);
}

/// A contract as sink at 5 V, 500 mA.
fn sink_contract() -> TestPort {
    let mut port = new_port();
    attach_to_source(&mut port);

    receive(
        &mut port,
        data(from_source(), DataMessageType::SourceCapabilities, &[fixed_5v(50)]),
    );
    assert_eq!(port.port_state(), State::SnkSelectCapability);

    receive(&mut port, control(from_source(), ControlMessageType::Accept));
    assert_eq!(port.port_state(), State::SnkTransitionSink);

    receive(&mut port, control(from_source(), ControlMessageType::PsRdy));
    assert_eq!(port.port_state(), State::SnkReady);

    port
}

/// A contract as source, with the sink capabilities known and identity discovery in flight.
fn source_contract() -> TestPort {
    let mut port = new_port();
    attach_to_sink(&mut port);
    assert_eq!(port.port_state(), State::SrcSendCapabilities);
    assert!(port.tcpc().board().vbus_5v);

    let request = FixedVariableSupply(0)
        .with_object_position(1)
        .with_raw_operating_current(50)
        .with_raw_max_operating_current(50);
    receive(&mut port, data(from_sink(), DataMessageType::Request, &[request.0]));
    assert_eq!(port.port_state(), State::SrcTransitionSupply);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::Accept));

    expire(&mut port, TimerSlot::State);
    assert_eq!(port.port_state(), State::SrcGetSinkCapabilities);
    assert!(port.notification().is_pd_connected);

    receive(
        &mut port,
        data(from_sink(), DataMessageType::SinkCapabilities, &[fixed_5v(90)]),
    );
    assert_eq!(port.port_state(), State::SrcReady);
    assert_eq!(last_vdm_command(&mut port), VdmCommand::DiscoverIdentity);

    port
}

/// Let the sink soft reset the source, and check that it is accepted and capabilities follow.
fn accept_soft_reset_as_source(port: &mut TestPort) {
    let sent = registers(port).transmitted.len();

    registers(port).inject_message(&control(from_sink(), ControlMessageType::SoftReset));
    port.tick().unwrap();
    assert_eq!(port.port_state(), State::SrcSoftReset);

    settle(port);
    assert_eq!(port.port_state(), State::SrcSendCapabilities);

    let transmitted = &registers(port).transmitted[sent..];
    assert_eq!(transmitted.len(), 2);
    assert!(transmitted[0].is_control(ControlMessageType::Accept));
    assert!(transmitted[1].is_data(DataMessageType::SourceCapabilities));
}

#[test]
fn debounce_needs_stable_lines() {
    let mut port = new_port();
    let chip = registers(&mut port);
    chip.partner = [Termination::Rp, Termination::Open];
    chip.set_vbus(true);
    chip.toggle_done(0b101);
    settle(&mut port);

    for _ in 0..N_DEBOUNCE_CNT {
        expire(&mut port, TimerSlot::Mux);
        assert_eq!(port.port_state(), State::AttachWaitSink);
    }

    port.expire_timer(TimerSlot::Mux);
    port.tick().unwrap();
    assert_eq!(port.port_state(), State::AttachedSink);
}

#[test]
fn changing_lines_restart_debounce() {
    let mut port = new_port();
    let chip = registers(&mut port);
    chip.partner = [Termination::Rp, Termination::Open];
    chip.set_vbus(true);
    chip.toggle_done(0b101);
    settle(&mut port);

    for _ in 0..5 {
        expire(&mut port, TimerSlot::Mux);
    }

    registers(&mut port).partner = [Termination::Open, Termination::Open];

    // One sample to notice the change, then a full debounce.
    for _ in 0..=N_DEBOUNCE_CNT {
        expire(&mut port, TimerSlot::Mux);
        assert_eq!(port.port_state(), State::AttachWaitSink);
    }

    expire(&mut port, TimerSlot::Mux);
    assert_eq!(port.port_state(), State::Unattached);
    assert!(!port.notification().is_cc_connected);
}

#[test]
fn sink_negotiates_5v() {
    let mut port = sink_contract();

    let notification = *port.notification();
    assert!(notification.is_cc_connected && notification.is_pd_connected);
    assert_eq!(notification.power_role, PowerRole::Sink);
    assert_eq!(notification.data_role, DataRole::Ufp);

    let request = registers(&mut port)
        .transmitted
        .iter()
        .find(|message| message.is_data(DataMessageType::Request))
        .cloned()
        .unwrap();
    assert_eq!(request.header.message_id(), 0);

    let object = FixedVariableSupply(request.object(0));
    assert_eq!(object.object_position(), 1);
    assert_eq!(object.raw_operating_current(), 50);
    assert!(object.capability_mismatch());

    let (voltage, current) = port.device_policy_manager().negotiated.unwrap();
    assert_eq!(voltage.get::<millivolt>(), 5000);
    assert_eq!(current.get::<milliampere>(), 500);

    let published = port.device_policy_manager().published.last().copied().unwrap();
    assert!(published.is_pd_connected);
}

#[test]
fn message_id_follows_acknowledged_messages() {
    let mut port = sink_contract();

    port.request_swap(Swap::Data).unwrap();
    settle(&mut port);

    assert_eq!(port.port_state(), State::DrsUfpSendSwap);
    let swap = last_transmitted(&mut port);
    assert!(swap.is_control(ControlMessageType::DrSwap));
    assert_eq!(swap.header.message_id(), 1);
}

#[test]
fn data_role_swap_starts_discovery() {
    let mut port = sink_contract();

    port.request_swap(Swap::Data).unwrap();
    settle(&mut port);
    receive(&mut port, control(from_source(), ControlMessageType::Accept));

    assert_eq!(port.port_state(), State::SnkReady);
    assert_eq!(port.notification().data_role, DataRole::Dfp);
    assert_eq!(last_vdm_command(&mut port), VdmCommand::DiscoverIdentity);
}

#[test]
fn rejected_swap_returns_to_ready() {
    let mut port = sink_contract();

    port.request_swap(Swap::Power).unwrap();
    settle(&mut port);
    assert_eq!(port.port_state(), State::SnkPrsSendSwap);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::PrSwap));

    receive(&mut port, control(from_source(), ControlMessageType::Reject));
    assert_eq!(port.port_state(), State::SnkReady);
    assert_eq!(port.notification().power_role, PowerRole::Sink);
}

#[test]
fn swap_needs_a_contract() {
    let mut port = new_port();

    assert_eq!(port.request_swap(Swap::Power), Err(Error::NotReady));
    assert_eq!(port.request_swap(Swap::Vconn), Err(Error::NotReady));
    assert_eq!(port.port_state(), State::Unattached);
}

#[test]
fn partner_soft_reset_is_accepted() {
    let mut port = sink_contract();

    receive(&mut port, control(from_source(), ControlMessageType::SoftReset));

    assert_eq!(port.port_state(), State::SnkWaitForCapabilities);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::Accept));
}

#[test]
fn soft_reset_while_waiting_for_request() {
    let mut port = new_port();
    attach_to_sink(&mut port);
    assert_eq!(port.port_state(), State::SrcSendCapabilities);

    accept_soft_reset_as_source(&mut port);
}

#[test]
fn soft_reset_during_supply_transition() {
    let mut port = new_port();
    attach_to_sink(&mut port);

    let request = FixedVariableSupply(0).with_object_position(1);
    receive(&mut port, data(from_sink(), DataMessageType::Request, &[request.0]));
    assert_eq!(port.port_state(), State::SrcTransitionSupply);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::Accept));

    accept_soft_reset_as_source(&mut port);
}

#[test]
fn sink_detaches_without_vbus() {
    let mut port = sink_contract();

    registers(&mut port).set_vbus(false);
    settle(&mut port);

    assert_eq!(port.port_state(), State::Unattached);
    assert!(!port.notification().is_cc_connected);

    let published = port.device_policy_manager().published.last().copied().unwrap();
    assert!(!published.is_cc_connected && !published.is_pd_connected);
}

#[test]
fn sink_hard_reset_waits_for_vbus_cycle() {
    let mut port = new_port();
    attach_to_source(&mut port);

    // VBUS was present on attach, so a soft reset comes first.
    expire(&mut port, TimerSlot::State);
    assert_eq!(port.port_state(), State::SnkSendSoftReset);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::SoftReset));

    expire(&mut port, TimerSlot::State);
    assert_eq!(port.port_state(), State::SnkTransitionToDefault);
    assert_eq!(registers(&mut port).hard_resets_sent, 1);

    registers(&mut port).set_vbus(false);
    settle(&mut port);
    assert_eq!(port.port_state(), State::SnkTransitionToDefault);

    registers(&mut port).set_vbus(true);
    settle(&mut port);
    assert_eq!(port.port_state(), State::SnkWaitForCapabilities);
}

#[test]
fn unanswered_capabilities_disable_pd() {
    let mut port = new_port();
    registers(&mut port).tx_response = TxResponse::Fail;
    attach_to_sink(&mut port);
    assert_eq!(port.port_state(), State::SrcDiscovery);

    for _ in 0..48 {
        expire(&mut port, TimerSlot::State);
        assert_eq!(port.port_state(), State::SrcDiscovery);
    }

    expire(&mut port, TimerSlot::State);
    assert_eq!(port.port_state(), State::Disabled);

    let chip = registers(&mut port);
    assert_eq!(chip.transmitted.len(), 50);
    assert!(
        chip.transmitted
            .iter()
            .all(|message| message.is_data(DataMessageType::SourceCapabilities))
    );
}

#[test]
fn unexpected_answer_to_capabilities_soft_resets() {
    let mut port = new_port();
    attach_to_sink(&mut port);
    assert_eq!(port.port_state(), State::SrcSendCapabilities);

    receive(&mut port, control(from_sink(), ControlMessageType::Accept));
    assert_eq!(port.port_state(), State::SrcSendSoftReset);
    assert!(last_transmitted(&mut port).is_control(ControlMessageType::SoftReset));

    receive(&mut port, control(from_sink(), ControlMessageType::Accept));
    assert_eq!(port.port_state(), State::SrcSendCapabilities);

    let capabilities = last_transmitted(&mut port);
    assert!(capabilities.is_data(DataMessageType::SourceCapabilities));
    assert_eq!(capabilities.header.message_id(), 0);
}

#[test]
fn invalid_request_is_rejected() {
    let mut port = new_port();
    attach_to_sink(&mut port);

    let request = FixedVariableSupply(0).with_object_position(3);
    receive(&mut port, data(from_sink(), DataMessageType::Request, &[request.0]));

    assert!(last_transmitted(&mut port).is_control(ControlMessageType::Reject));

    // Without a contract, the rejection is followed by a hard reset.
    assert_eq!(port.port_state(), State::SrcTransitionToDefault);
    assert_eq!(registers(&mut port).hard_resets_sent, 1);
    assert!(!port.tcpc().board().vbus_5v);
}

#[test]
fn request_for_position_zero_is_rejected() {
    let mut port = new_port();
    attach_to_sink(&mut port);

    let request = FixedVariableSupply(0).with_raw_operating_current(50);
    receive(&mut port, data(from_sink(), DataMessageType::Request, &[request.0]));

    assert!(
        registers(&mut port)
            .transmitted
            .iter()
            .any(|message| message.is_control(ControlMessageType::Reject))
    );
    assert_eq!(port.port_state(), State::SrcTransitionToDefault);
    assert!(!port.notification().is_pd_connected);
}

#[test]
fn display_port_discovery() {
    let mut port = source_contract();

    receive(
        &mut port,
        vdm(PD_SID, VdmCommand::DiscoverIdentity, VdmCommandType::ResponderACK, &[0x1234_5678]),
    );
    assert_eq!(port.vdm_state(), VdmState::DiscoverySvid);
    assert_eq!(last_vdm_command(&mut port), VdmCommand::DiscoverSVIDS);

    receive(
        &mut port,
        vdm(PD_SID, VdmCommand::DiscoverSVIDS, VdmCommandType::ResponderACK, &[u32::from(DISPLAYPORT_SID) << 16]),
    );
    assert_eq!(port.vdm_state(), VdmState::DiscoveryModes);
    assert_eq!(last_vdm_command(&mut port), VdmCommand::DiscoverModes);

    let capabilities = DisplayPortCapabilities::default().with_dfp_d_pins(pin::C | pin::D);
    receive(
        &mut port,
        vdm(DISPLAYPORT_SID, VdmCommand::DiscoverModes, VdmCommandType::ResponderACK, &[capabilities.0]),
    );
    assert_eq!(port.vdm_state(), VdmState::EnterMode);
    assert_eq!(port.notification().pin_assignment_support, pin::C | pin::D);

    receive(&mut port, vdm(DISPLAYPORT_SID, VdmCommand::EnterMode, VdmCommandType::ResponderACK, &[]));
    assert_eq!(port.vdm_state(), VdmState::UpdateStatus);

    let status = last_transmitted(&mut port);
    assert_eq!(VdmHeaderStructured(status.object(0)).command(), VdmCommand::DisplayPortStatus);
    assert_eq!(status.object(1), 5);

    let status = DisplayPortStatus::default().with_connected(2).with_hpd_state(true);
    receive(
        &mut port,
        vdm(DISPLAYPORT_SID, VdmCommand::DisplayPortStatus, VdmCommandType::ResponderACK, &[status.0]),
    );
    assert_eq!(port.vdm_state(), VdmState::DpConfig);

    // Multi-function is not preferred, which leaves C.
    let config = DisplayPortConfig(last_transmitted(&mut port).object(1));
    assert_eq!(config.pin_assignment(), pin::C);
    assert_eq!(config.signaling(), 1);
    assert_eq!(config.select_configuration(), 2);

    receive(
        &mut port,
        vdm(DISPLAYPORT_SID, VdmCommand::DisplayPortConfig, VdmCommandType::ResponderACK, &[]),
    );
    assert_eq!(port.vdm_state(), VdmState::Ready);
    assert_eq!(port.port_state(), State::SrcReady);

    let published = port.device_policy_manager().published.last().copied().unwrap();
    assert!(published.is_enter_mode);
    assert_eq!(published.pin_assignment_def, pin::C);

    let connector = published.connector_state();
    assert!(connector.usb_host && connector.display_port);
    assert!(!connector.super_speed);
}

#[test]
fn rejected_discovery_keeps_the_contract() {
    let mut port = source_contract();

    receive(
        &mut port,
        vdm(PD_SID, VdmCommand::DiscoverIdentity, VdmCommandType::ResponderACK, &[0x1234_5678]),
    );
    receive(&mut port, vdm(PD_SID, VdmCommand::DiscoverSVIDS, VdmCommandType::ResponderNAK, &[]));

    assert_eq!(port.vdm_state(), VdmState::Error);
    assert_eq!(port.port_state(), State::SrcReady);
    assert!(port.notification().is_pd_connected);
}

#[test]
fn discovery_timeout_keeps_the_contract() {
    let mut port = source_contract();
    let sent = registers(&mut port).transmitted.len();

    expire(&mut port, TimerSlot::State);

    assert_eq!(port.vdm_state(), VdmState::Error);
    assert_eq!(port.port_state(), State::SrcReady);
    assert_eq!(registers(&mut port).transmitted.len(), sent);
}

#[test]
fn attention_is_published_once() {
    let mut port = source_contract();

    let status = DisplayPortStatus::default().with_hpd_state(true).with_irq_hpd(true);
    let header = VdmHeaderStructured::request(DISPLAYPORT_SID, 1, VdmCommand::Attention);
    receive(
        &mut port,
        data(from_sink(), DataMessageType::VendorDefined, &[header.0, status.0]),
    );

    let published = port.device_policy_manager().published.last().copied().unwrap();
    assert!(published.attention);
    assert_eq!(published.dp_status, status.0);
    assert!(!port.notification().attention);
}

#[test]
fn audio_accessory() {
    let mut port = new_port();
    let chip = registers(&mut port);
    chip.partner = [Termination::Ra, Termination::Ra];
    chip.toggle_done(0b111);
    settle(&mut port);
    assert_eq!(port.port_state(), State::AttachWaitAudioAccessory);

    debounce(&mut port);
    assert_eq!(port.port_state(), State::Disabled);
    assert!(port.notification().is_cc_connected);
    assert_eq!(port.device_policy_manager().headphone, [true]);

    let chip = registers(&mut port);
    chip.partner = [Termination::Open, Termination::Open];
    chip.comp_change();
    settle(&mut port);

    assert_eq!(port.port_state(), State::Unattached);
    assert_eq!(port.device_policy_manager().headphone, [true, false]);
}
