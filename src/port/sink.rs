//! Policy states of the sink.
use fusb302_pd_traits::{Board, RegisterAccess};
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;

use super::{Events, Port, PortError, State, Step, TxState};
use crate::counters::N_HARDRESET_COUNT;
use crate::device_policy_manager::{ChargerLimits, DevicePolicyManager};
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType};
use crate::protocol_layer::message::pdo::{Kind, RawPowerDataObject};
use crate::protocol_layer::message::request::FixedVariableSupply;
use crate::protocol_layer::message::MAX_DATA_OBJECTS;
use crate::timers::TimerType;
use crate::units::{ElectricCurrent, ElectricPotential};
use crate::DataRole;

/// Highest voltage that is requested without charger limits, in 50 mV units.
const DEFAULT_MAX_RAW_VOLTAGE: u16 = 100;

/// Voltage and current fields of fixed supplies and batteries. Other kinds are not requested.
fn supply_fields(pdo: u32) -> Option<(u16, u16)> {
    let raw = RawPowerDataObject(pdo);

    match raw.kind() {
        Kind::FixedSupply | Kind::Battery => Some((raw.raw_voltage(), raw.raw_current())),
        _ => None,
    }
}

/// Voltage in mV and current in mA of raw PDO fields.
fn millis(raw_voltage: u16, raw_current: u16) -> (u32, u32) {
    (u32::from(raw_voltage) * 50, u32::from(raw_current) * 10)
}

fn output_of(raw_voltage: u16, raw_current: u16) -> (ElectricPotential, ElectricCurrent) {
    let (millivolts, milliamperes) = millis(raw_voltage, raw_current);

    (
        ElectricPotential::new::<millivolt>(millivolts),
        ElectricCurrent::new::<milliampere>(milliamperes),
    )
}

/// Select a capability by its position, starting at one.
///
/// Without limits, the last capability at or below 5 V is taken. Charger limits refine the choice
/// to the last capability within both limits, if there is one.
pub(crate) fn select_capability(
    capabilities: &[u32],
    limits: Option<ChargerLimits>,
) -> Option<(u8, (ElectricPotential, ElectricCurrent))> {
    let mut selected = None;

    for (index, pdo) in capabilities.iter().enumerate() {
        if let Some((voltage, current)) = supply_fields(*pdo) {
            if voltage <= DEFAULT_MAX_RAW_VOLTAGE {
                selected = Some((index as u8 + 1, output_of(voltage, current)));
            }
        }
    }

    if let Some(limits) = limits {
        let max_millivolts = limits.max_voltage.get::<millivolt>();
        let max_milliamperes = limits.max_current.get::<milliampere>();

        let within_limits = capabilities.iter().enumerate().rev().find_map(|(index, pdo)| {
            let (voltage, current) = supply_fields(*pdo)?;
            let (millivolts, milliamperes) = millis(voltage, current);

            (millivolts <= max_millivolts && milliamperes <= max_milliamperes)
                .then(|| (index as u8 + 1, output_of(voltage, current)))
        });

        if within_limits.is_some() {
            selected = within_limits;
        }
    }

    selected.filter(|(position, _)| usize::from(*position) <= MAX_DATA_OBJECTS)
}

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    pub(super) fn snk_startup(&mut self) -> Result<(), PortError<R>> {
        self.policy_startup(State::SnkDiscovery)
    }

    pub(super) fn snk_discovery(&mut self) {
        self.set_state(State::SnkWaitForCapabilities);
        self.timer_state.start(TimerType::TypeCSinkWaitCap);
    }

    /// Give up on a source that does not talk PD, or that could not be reset.
    fn snk_give_up(&mut self) {
        if self.is_pd_support {
            self.set_state(State::ErrorRecovery);
        } else {
            self.set_state(State::Disabled);
        }
    }

    pub(super) fn snk_wait_for_capabilities(&mut self, events: Events) {
        if events.rx() {
            if self.received.is_data(DataMessageType::SourceCapabilities) {
                self.is_pd_support = true;
                self.timer_mux.disable();
                self.set_state(State::SnkEvaluateCapabilities);
            }
        } else if events.timer_state() {
            if self.hard_reset_counter.value() <= N_HARDRESET_COUNT {
                if self.vbus_begin {
                    // VBUS was present before the attach, the source may still hold a contract.
                    self.vbus_begin = false;
                    self.set_state(State::SnkSendSoftReset);
                } else {
                    self.set_state(State::SnkSendHardReset);
                }
            } else {
                self.snk_give_up();
            }
        } else if events.timer_mux() && self.hard_reset_counter.value() > N_HARDRESET_COUNT {
            self.snk_give_up();
        }
    }

    pub(super) fn snk_evaluate_capabilities(&mut self) {
        self.hard_reset_counter.reset();
        self.source_capabilities = self.received.objects.clone();

        let limits = self.device_policy_manager.charger_limits();

        match select_capability(&self.source_capabilities, limits) {
            Some((position, output)) => {
                self.position = position;
                self.pd_output = Some(output);
                self.set_state(State::SnkSelectCapability);
            }
            None => {
                self.position = 0;
                self.set_state(State::SnkWaitForCapabilities);
            }
        }
    }

    /// The request for the selected capability, at its full current.
    fn request_object(&self) -> u32 {
        let index = usize::from(self.position.saturating_sub(1));
        let (_, raw_current) = self
            .source_capabilities
            .get(index)
            .copied()
            .and_then(supply_fields)
            .unwrap_or_default();

        FixedVariableSupply(0)
            .with_object_position(self.position)
            .with_capability_mismatch(true)
            .with_raw_operating_current(raw_current)
            .with_raw_max_operating_current(raw_current)
            .0
    }

    pub(super) fn snk_select_capability(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            if self.step == Step::Entry {
                let request = self.request_object();
                self.stage_data(DataMessageType::Request, &[request]);
                self.step = Step::Transmit;
            }

            match self.send()? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.step = Step::Wait;
                }
                TxState::Failed => {
                    self.set_state(State::SnkDiscovery);
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
                self.set_state(State::SnkTransitionSink);
                self.timer_state.start(TimerType::PsTransition);
            } else if self.received.is_control(ControlMessageType::Wait)
                || self.received.is_control(ControlMessageType::Reject)
            {
                if self.is_pd_connected() {
                    info!("PD connected as UFP, fetching 5 V");
                    self.set_state(State::SnkReady);
                } else {
                    self.set_state(State::SnkWaitForCapabilities);
                    // No hard reset after a rejection, it would loop.
                    self.hard_reset_counter.set(N_HARDRESET_COUNT + 1);
                }
            }
        } else if events.timer_state() {
            self.set_state(State::SnkSendHardReset);
        }

        Ok(())
    }

    pub(super) fn snk_transition_sink(&mut self, events: Events) {
        if events.rx() {
            if self.received.is_control(ControlMessageType::PsRdy) {
                self.set_pd_connected(true);
                info!("PD connected as UFP, fetching 5 V");
                self.set_state(State::SnkReady);
            } else if self.received.is_data(DataMessageType::SourceCapabilities) {
                self.set_state(State::SnkEvaluateCapabilities);
            }
        } else if events.timer_state() {
            self.set_state(State::SnkSendHardReset);
        }
    }

    /// Wait for VBUS to drop and recover after a hard reset.
    pub(super) fn snk_transition_to_default(&mut self, events: Events) -> Result<(), PortError<R>> {
        match self.step {
            Step::Entry => {
                self.set_pd_connected(false);
                self.timer_mux.start(TimerType::NoResponse);
                self.timer_state.start(TimerType::HardResetVbusOff);

                if self.data_role() == DataRole::Dfp {
                    self.set_msg_header()?;
                }

                self.step = Step::Wait;
                self.snk_wait_vbus_off(events)?;
            }
            Step::Wait => self.snk_wait_vbus_off(events)?,
            _ => {
                if self.tcpc.check_vbus()? {
                    self.timer_state.disable();
                    self.set_state(State::SnkStartup);
                } else if events.timer_state() {
                    self.set_state(State::SnkStartup);
                }
            }
        }

        Ok(())
    }

    fn snk_wait_vbus_off(&mut self, events: Events) -> Result<(), PortError<R>> {
        if !self.tcpc.check_vbus()? {
            self.step = Step::Settle;
            self.timer_state.start(TimerType::HardResetVbusOn);
        } else if events.timer_state() {
            self.set_state(State::SnkStartup);
        }

        Ok(())
    }

    pub(super) fn snk_ready(&mut self, events: Events) -> Result<(), PortError<R>> {
        self.ready_receive(events);

        if self.vdm_active() {
            self.auto_vdm(events)?;
        }

        if self.state == State::SnkReady {
            self.swap_msg_process(events);
        }

        self.notify();
        Ok(())
    }

    /// Accept a soft reset of the partner.
    pub(super) fn snk_soft_reset(&mut self) -> Result<(), PortError<R>> {
        match self.send_control_once(ControlMessageType::Accept)? {
            TxState::Success => {
                self.soft_reset_parameters();
                self.timer_state.start(TimerType::TypeCSinkWaitCap);
                self.set_state(State::SnkWaitForCapabilities);
            }
            TxState::Failed => self.set_state(State::SnkSendHardReset),
            _ => {}
        }

        Ok(())
    }

    pub(super) fn snk_send_soft_reset(&mut self, events: Events) -> Result<(), PortError<R>> {
        if self.step != Step::Wait {
            match self.send_control_once(ControlMessageType::SoftReset)? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.step = Step::Wait;
                }
                TxState::Failed => {
                    self.set_state(State::SnkSendHardReset);
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
                self.timer_state.start(TimerType::TypeCSinkWaitCap);
                self.set_state(State::SnkWaitForCapabilities);
            }
        } else if events.timer_state() {
            self.set_state(State::SnkSendHardReset);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uom::si::electric_current::milliampere;
    use uom::si::electric_potential::millivolt;

    use super::*;
    use crate::protocol_layer::message::pdo::FixedSupply;

    fn fixed(raw_voltage: u16, raw_max_current: u16) -> u32 {
        FixedSupply::new()
            .with_raw_voltage(raw_voltage)
            .with_raw_max_current(raw_max_current)
            .0
    }

    #[test]
    fn last_capability_at_5v() {
        // 5 V 3 A, 9 V 2 A, then a 5 V 1 A duplicate.
        let capabilities = [fixed(100, 300), fixed(180, 200), fixed(100, 100)];
        let (position, (voltage, current)) = select_capability(&capabilities, None).unwrap();

        assert_eq!(position, 3);
        assert_eq!(voltage.get::<millivolt>(), 5000);
        assert_eq!(current.get::<milliampere>(), 1000);
    }

    #[test]
    fn charger_limits_pick_highest_within() {
        let capabilities = [fixed(100, 300), fixed(180, 200), fixed(300, 300)];
        let limits = ChargerLimits {
            max_voltage: ElectricPotential::new::<millivolt>(12000),
            max_current: ElectricCurrent::new::<milliampere>(2000),
        };

        let (position, (voltage, _)) = select_capability(&capabilities, Some(limits)).unwrap();
        assert_eq!(position, 2);
        assert_eq!(voltage.get::<millivolt>(), 9000);
    }

    #[test]
    fn limits_without_match_keep_default() {
        let capabilities = [fixed(100, 300)];
        let limits = ChargerLimits {
            max_voltage: ElectricPotential::new::<millivolt>(3300),
            max_current: ElectricCurrent::new::<milliampere>(500),
        };

        assert_eq!(select_capability(&capabilities, Some(limits)).map(|(position, _)| position), Some(1));
    }

    #[test]
    fn current_below_one_ampere() {
        let (position, (voltage, current)) = select_capability(&[fixed(100, 50)], None).unwrap();

        assert_eq!(position, 1);
        assert_eq!(voltage.get::<millivolt>(), 5000);
        assert_eq!(current.get::<milliampere>(), 500);
    }

    #[test]
    fn current_limit_between_whole_amperes() {
        // 5 V 3 A and 9 V 1.9 A, against 9 V 1.5 A.
        let capabilities = [fixed(100, 300), fixed(180, 190)];
        let limits = ChargerLimits {
            max_voltage: ElectricPotential::new::<millivolt>(9000),
            max_current: ElectricCurrent::new::<milliampere>(1500),
        };

        // No capability fits, the default choice stays.
        let (position, (_, current)) = select_capability(&capabilities, Some(limits)).unwrap();
        assert_eq!(position, 1);
        assert_eq!(current.get::<milliampere>(), 3000);

        let capabilities = [fixed(100, 150), fixed(180, 190), fixed(180, 140)];
        let (position, (voltage, current)) = select_capability(&capabilities, Some(limits)).unwrap();
        assert_eq!(position, 3);
        assert_eq!(voltage.get::<millivolt>(), 9000);
        assert_eq!(current.get::<milliampere>(), 1400);
    }

    #[test]
    fn nothing_at_5v() {
        let variable = (0b10 << 30) | (100 << 10) | 100;
        assert_eq!(select_capability(&[fixed(180, 300), variable], None), None);
    }
}
