//! Simulated hardware for testing: a FUSB302 register file, a board, an interrupt line and a
//! device policy manager that records what it is told.
use core::convert::Infallible;
use core::future::pending;

use fusb302_pd_traits::{Board, InterruptLine, RegisterAccess};

use crate::device_policy_manager::{ChargerLimits, DevicePolicyManager};
use crate::notify::Notification;
use crate::protocol_layer::{
    self,
    message::{MAX_DATA_OBJECTS, Message},
};
use crate::registers::{
    Control0, Control1, Control3, HostCurrent, Interrupt, InterruptA, InterruptB, Measure, Register, Reset, Status0,
    Status1A, Switches0,
};
use crate::timers::Timer;
use crate::units::{ElectricCurrent, ElectricPotential};

const REGISTER_COUNT: usize = Register::Fifo as usize + 1;

/// Start of packet token in the receive FIFO.
const SOP: u8 = 0xe0;

/// Comparator levels that a termination of the partner produces against the local pull-up.
const LEVEL_OPEN: u8 = 0x3f;
const LEVEL_RD: u8 = 0x20;
const LEVEL_RA: u8 = 0x02;

/// Termination of the simulated partner on one CC line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Termination {
    /// Nothing attached.
    #[default]
    Open,
    /// Cable or accessory.
    Ra,
    /// Sink.
    Rd,
    /// Source.
    Rp,
}

/// How the simulated chip completes a transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TxResponse {
    /// The partner acknowledges with GoodCRC.
    #[default]
    Ack,
    /// All retries fail.
    Fail,
    /// Nothing happens until [`DummyRegisters::complete_tx`].
    Hold,
}

/// A FUSB302 register file.
///
/// Interrupt registers clear on read. STATUS0 follows from the partner terminations, the switch
/// setup and the comparator threshold. Frames that are written into the FIFO are decoded and
/// recorded.
#[derive(Debug)]
pub struct DummyRegisters {
    values: [u8; REGISTER_COUNT],
    rx_fifo: std::collections::VecDeque<u8>,
    /// Terminations of the partner on CC1 and CC2.
    pub partner: [Termination; 2],
    /// VBUS is present.
    pub vbus: bool,
    /// Completion of the next transmissions.
    pub tx_response: TxResponse,
    /// Decoded messages in order of transmission.
    pub transmitted: std::vec::Vec<Message>,
    /// Number of hard reset ordered sets that were sent.
    pub hard_resets_sent: usize,
    /// Number of PD logic resets.
    pub pd_resets: usize,
}

impl Default for DummyRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyRegisters {
    /// A chip with the register values after power-on.
    pub fn new() -> Self {
        Self {
            values: Self::power_on_values(),
            rx_fifo: std::collections::VecDeque::new(),
            partner: [Termination::Open; 2],
            vbus: false,
            tx_response: TxResponse::Ack,
            transmitted: std::vec::Vec::new(),
            hard_resets_sent: 0,
            pd_resets: 0,
        }
    }

    fn power_on_values() -> [u8; REGISTER_COUNT] {
        let mut values = [0; REGISTER_COUNT];
        values[usize::from(u8::from(Register::DeviceId))] = 0x91;
        values[usize::from(u8::from(Register::Switches0))] = Switches0::PULL_DOWN;
        values[usize::from(u8::from(Register::Switches1))] = 0x20;
        values[usize::from(u8::from(Register::Measure))] = 0x31;
        values[usize::from(u8::from(Register::Control0))] =
            Control0(0).with_int_mask(true).with_host_cur(HostCurrent::Default).0;
        values[usize::from(u8::from(Register::Control2))] = 0x02;
        values[usize::from(u8::from(Register::Control3))] = 0x06;
        values[usize::from(u8::from(Register::Power))] = 0x01;
        values
    }

    /// Set a register without side effects.
    pub fn poke(&mut self, address: u8, value: u8) {
        self.values[usize::from(address)] = value;
    }

    /// Read a register without side effects.
    pub fn peek(&self, address: u8) -> u8 {
        self.values[usize::from(address)]
    }

    fn raise(&mut self, register: Register, bits: u8) {
        self.values[usize::from(u8::from(register))] |= bits;
    }

    /// Queue a received message, framed like the chip does, and flag the GoodCRC that the chip
    /// answered with.
    pub fn inject_message(&mut self, message: &Message) {
        let mut body = [0u8; 2 + MAX_DATA_OBJECTS * 4];
        let length = message.to_bytes(&mut body);

        self.rx_fifo.push_back(SOP);
        self.rx_fifo.extend(&body[..length]);
        self.rx_fifo.extend([0u8; 4]);

        self.raise(Register::InterruptB, InterruptB(0).with_gcrcsent(true).0);
    }

    /// Bytes left in the receive FIFO.
    pub fn rx_fifo_len(&self) -> usize {
        self.rx_fifo.len()
    }

    /// Finish the toggle logic with the given TOGSS result.
    pub fn toggle_done(&mut self, togss: u8) {
        self.poke(Register::Status1A.into(), Status1A(0).with_togss(togss).0);
        self.raise(Register::InterruptA, InterruptA(0).with_togdone(true).0);
    }

    /// Change VBUS, and flag the change.
    pub fn set_vbus(&mut self, present: bool) {
        self.vbus = present;
        self.raise(Register::Interrupt, Interrupt(0).with_vbusok(true).0);
    }

    /// Flag a change of the comparator output.
    pub fn comp_change(&mut self) {
        self.raise(Register::Interrupt, Interrupt(0).with_comp_chng(true).0);
    }

    /// Flag a hard reset of the partner.
    pub fn receive_hard_reset(&mut self) {
        self.raise(Register::InterruptA, InterruptA(0).with_hardrst(true).0);
    }

    /// Complete a held transmission.
    pub fn complete_tx(&mut self, success: bool) {
        let flag = if success {
            InterruptA(0).with_txsent(true)
        } else {
            InterruptA(0).with_retryfail(true)
        };
        self.raise(Register::InterruptA, flag.0);
    }

    /// The last transmitted message.
    pub fn last_transmitted(&self) -> Option<&Message> {
        self.transmitted.last()
    }

    /// Whether any interrupt flag is pending.
    pub fn has_interrupt(&self) -> bool {
        [Register::Interrupt, Register::InterruptA, Register::InterruptB]
            .into_iter()
            .any(|register| self.peek(register.into()) != 0)
    }

    fn status0(&self) -> Status0 {
        let switches = Switches0(self.peek(Register::Switches0.into()));
        let threshold = Measure(self.peek(Register::Measure.into())).mdac();

        let line = if switches.meas_cc1() {
            Some((0, switches.pu_en1(), switches.pdwn1()))
        } else if switches.meas_cc2() {
            Some((1, switches.pu_en2(), switches.pdwn2()))
        } else {
            None
        };

        let (comp, bc_lvl) = match line {
            Some((index, true, _)) => {
                let level = match self.partner[index] {
                    Termination::Open | Termination::Rp => LEVEL_OPEN,
                    Termination::Rd => LEVEL_RD,
                    Termination::Ra => LEVEL_RA,
                };
                (level > threshold, 0)
            }
            Some((index, false, true)) if self.partner[index] == Termination::Rp => (false, 1),
            _ => (false, 0),
        };

        Status0(0).with_vbusok(self.vbus).with_comp(comp).with_bc_lvl(bc_lvl)
    }

    fn flush_rx(&mut self) {
        self.rx_fifo.clear();
    }

    fn transmit(&mut self, frame: &[u8]) {
        if let Ok(message) = protocol_layer::decode(frame) {
            self.transmitted.push(message);
        }

        match self.tx_response {
            TxResponse::Ack => self.complete_tx(true),
            TxResponse::Fail => self.complete_tx(false),
            TxResponse::Hold => {}
        }
    }
}

impl RegisterAccess for DummyRegisters {
    type Error = Infallible;

    fn read(&mut self, address: u8) -> Result<u8, Self::Error> {
        let register = usize::from(address);

        if address == u8::from(Register::Status0) {
            return Ok(self.status0().0);
        }

        if address == u8::from(Register::Fifo) {
            return Ok(self.rx_fifo.pop_front().unwrap_or(0));
        }

        let value = self.values[register];
        if address == u8::from(Register::Interrupt)
            || address == u8::from(Register::InterruptA)
            || address == u8::from(Register::InterruptB)
        {
            self.values[register] = 0;
        }

        Ok(value)
    }

    fn write(&mut self, address: u8, value: u8) -> Result<(), Self::Error> {
        let mut value = value;

        if address == u8::from(Register::Reset) {
            let reset = Reset(value);
            if reset.sw_reset() {
                self.values = Self::power_on_values();
            }
            if reset.pd_reset() {
                self.pd_resets += 1;
                self.flush_rx();
            }
            return Ok(());
        } else if address == u8::from(Register::Control0) {
            value = Control0(value).with_tx_flush(false).with_tx_start(false).0;
        } else if address == u8::from(Register::Control1) {
            if Control1(value).rx_flush() {
                self.flush_rx();
            }
            value = Control1(value).with_rx_flush(false).0;
        } else if address == u8::from(Register::Control3) && Control3(value).send_hard_reset() {
            self.hard_resets_sent += 1;
            self.raise(Register::InterruptA, InterruptA(0).with_hardsent(true).0);
            value = Control3(value).with_send_hard_reset(false).0;
        } else if address == u8::from(Register::Fifo) {
            self.transmit(&[value]);
            return Ok(());
        }

        self.values[usize::from(address)] = value;
        Ok(())
    }

    fn raw_read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buffer.iter_mut() {
            *byte = self.read(address)?;
        }

        Ok(())
    }

    fn raw_write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        if address == u8::from(Register::Fifo) {
            self.transmit(data);
            return Ok(());
        }

        for byte in data {
            self.write(address, *byte)?;
        }

        Ok(())
    }
}

/// A board that records the actuators.
#[derive(Debug, Default)]
pub struct DummyBoard {
    /// The 5 V rail is on.
    pub vbus_5v: bool,
    /// Another rail is on.
    pub vbus_other: bool,
    /// The discharge path is on.
    pub discharge: bool,
    /// Number of times the discharge path was switched on.
    pub discharge_pulses: usize,
}

impl Board for DummyBoard {
    fn set_vbus(&mut self, vbus_5v: bool, vbus_other: bool) {
        self.vbus_5v = vbus_5v;
        self.vbus_other = vbus_other;
    }

    fn vbus_5v_enabled(&self) -> bool {
        self.vbus_5v
    }

    fn set_discharge(&mut self, on: bool) {
        if on && !self.discharge {
            self.discharge_pulses += 1;
        }
        self.discharge = on;
    }

    fn delay_us(&mut self, _microseconds: u32) {}

    fn delay_ms(&mut self, _milliseconds: u32) {}
}

/// An interrupt line that is asserted on demand.
#[derive(Debug, Default)]
pub struct DummyLine {
    /// Interrupt delivery is enabled.
    pub enabled: bool,
    /// Number of calls to [`InterruptLine::set_enabled`].
    pub set_enabled_calls: usize,
    /// The line is asserted.
    pub asserted: bool,
}

impl InterruptLine for DummyLine {
    fn is_asserted(&mut self) -> bool {
        self.asserted
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.set_enabled_calls += 1;
    }

    async fn wait_for_interrupt(&mut self) {
        if !self.asserted {
            pending::<()>().await;
        }
    }
}

/// A device policy manager that records what it is told.
#[derive(Debug, Default)]
pub struct DummyPolicyManager {
    /// Published snapshots.
    pub published: std::vec::Vec<Notification>,
    /// Negotiated power as sink.
    pub negotiated: Option<(ElectricPotential, ElectricCurrent)>,
    /// Audio accessory insertions and removals.
    pub headphone: std::vec::Vec<bool>,
    /// Limits to select a capability with.
    pub limits: Option<ChargerLimits>,
}

impl DevicePolicyManager for DummyPolicyManager {
    fn publish(&mut self, notification: &Notification) {
        self.published.push(*notification);
    }

    fn negotiated_power(&mut self, voltage: ElectricPotential, current: ElectricCurrent) {
        self.negotiated = Some((voltage, current));
    }

    fn headphone_switch(&mut self, inserted: bool) {
        self.headphone.push(inserted);
    }

    fn charger_limits(&mut self) -> Option<ChargerLimits> {
        self.limits
    }
}

/// A timer that never expires. Countdowns are expired by hand in tests.
pub struct DummyTimer {}

impl Timer for DummyTimer {
    async fn after_millis(_milliseconds: u64) {
        pending::<()>().await;
    }
}
