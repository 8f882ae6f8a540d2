//! The FUSB302 port controller, driven through its registers.
//!
//! Wraps the register transport and the board actuators, and keeps the few pieces of chip
//! configuration that other operations depend on: the active CC line, VCONN, the comparator
//! thresholds and the result of the toggle logic.
use fusb302_pd_traits::{Board, RegisterAccess};

use crate::config::RpCurrent;
use crate::protocol_layer::{self, message::Message};
use crate::registers::{
    Control0, Control1, Control2, Control3, Interrupt, InterruptA, InterruptB, Power, Register, Reset, Status0, Status1A,
    Switches0, Switches1,
};
use crate::{DataRole, PowerRole};

/// Which CC line carries communication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// CC1.
    #[default]
    Cc1,
    /// CC2.
    Cc2,
}

impl Polarity {
    /// The other line.
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Cc1 => Polarity::Cc2,
            Polarity::Cc2 => Polarity::Cc1,
        }
    }
}

/// Classification of the voltage on a CC line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcVoltage {
    /// Nothing attached.
    #[default]
    Open,
    /// Cable or accessory pull-down.
    Ra,
    /// Sink pull-down.
    Rd,
    /// Source pull-up.
    Rp,
}

/// Role of the local port, as found by the toggle logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcRole {
    /// Source, the partner presents Rd.
    Dfp,
    /// Sink, the partner presents Rp.
    Ufp,
    /// Audio adapter accessory, Ra on both lines.
    AudioAccessory,
}

/// Result of the toggle logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CcState {
    /// Local role.
    pub role: CcRole,
    /// The partner was detected on CC1.
    pub on_cc1: bool,
    /// The partner was detected on CC2.
    pub on_cc2: bool,
}

impl CcState {
    /// Decode the TOGSS field of STATUS1A.
    pub fn from_togss(togss: u8) -> Self {
        let lines = togss & 0x3;

        let role = if togss & 0x4 != 0 {
            if lines == 0x3 {
                CcRole::AudioAccessory
            } else {
                CcRole::Ufp
            }
        } else {
            CcRole::Dfp
        };

        Self {
            role,
            on_cc1: lines & 0x1 != 0,
            on_cc2: lines & 0x2 != 0,
        }
    }

    /// The line to communicate on.
    pub fn polarity(&self) -> Polarity {
        if self.on_cc1 { Polarity::Cc1 } else { Polarity::Cc2 }
    }
}

/// Interrupt flags, read in one go. Reading clears them on the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alerts {
    /// INTERRUPT register.
    pub interrupt: Interrupt,
    /// INTERRUPTA register.
    pub interrupt_a: InterruptA,
    /// INTERRUPTB register.
    pub interrupt_b: InterruptB,
}

/// The port controller.
#[derive(Debug)]
pub struct Tcpc<R, B> {
    pub(crate) registers: R,
    pub(crate) board: B,
    pub(crate) chip_id: u8,
    pub(crate) polarity: Polarity,
    pub(crate) vconn_enabled: bool,
    pub(crate) measure_high: u8,
    pub(crate) measure_low: u8,
    pub(crate) cc_state: Option<CcState>,
}

impl<R: RegisterAccess, B: Board> Tcpc<R, B> {
    /// Wrap a register transport and board. The chip is not touched.
    pub fn new(registers: R, board: B) -> Self {
        let (measure_high, measure_low) = RpCurrent::Default.thresholds();

        Self {
            registers,
            board,
            chip_id: 0,
            polarity: Polarity::Cc1,
            vconn_enabled: false,
            measure_high,
            measure_low,
            cc_state: None,
        }
    }

    /// The device ID, as read during initialization.
    pub fn chip_id(&self) -> u8 {
        self.chip_id
    }

    /// The active CC line.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// The toggle result, if any.
    pub fn cc_state(&self) -> Option<CcState> {
        self.cc_state
    }

    /// The local role from the toggle result, if any.
    pub fn cc_role(&self) -> Option<CcRole> {
        self.cc_state.map(|state| state.role)
    }

    /// Override the local role, keeping the lines of the toggle result.
    pub(crate) fn set_cc_role(&mut self, role: CcRole) {
        let mut state = self.cc_state.unwrap_or(CcState {
            role,
            on_cc1: self.polarity == Polarity::Cc1,
            on_cc2: self.polarity == Polarity::Cc2,
        });
        state.role = role;
        self.cc_state = Some(state);
    }

    /// The board.
    pub fn board(&mut self) -> &mut B {
        &mut self.board
    }

    /// The register transport.
    pub fn registers(&mut self) -> &mut R {
        &mut self.registers
    }

    /// Switch the VBUS supplies, with a discharge pulse when the 5 V rail is switched off.
    pub fn set_vbus(&mut self, vbus_5v: bool, vbus_other: bool) {
        let was_on = self.board.vbus_5v_enabled();

        self.board.set_vbus(vbus_5v, vbus_other);

        if !vbus_5v && was_on {
            self.board.set_discharge(true);
            self.board.delay_ms(20);
            self.board.set_discharge(false);
        }
    }

    /// Bring the chip into its default configuration.
    ///
    /// Switches VBUS off, resets the chip, sets up automatic retries, unmasks the interrupts that
    /// the port logic consumes, and powers all blocks.
    pub fn init(&mut self, rp_current: RpCurrent) -> Result<(), R::Error> {
        self.chip_id = self.registers.read(Register::DeviceId.into())?;
        self.set_vbus(false, false);
        self.cc_state = None;

        self.registers
            .update_bits(Register::Reset.into(), Reset(0).with_sw_reset(true).0, Reset(0).with_sw_reset(true).0)?;
        self.pd_reset()?;

        let retries = Control3(0).with_auto_retry(true).with_n_retries(3).0;
        self.registers.update_bits(Register::Control3.into(), retries, retries)?;

        let mask = !Interrupt(0).with_collision(true).with_alert(true).with_vbusok(true).0;
        self.registers.write(Register::Mask.into(), mask)?;

        let mask_a = !InterruptA(0)
            .with_retryfail(true)
            .with_hardsent(true)
            .with_txsent(true)
            .with_hardrst(true)
            .with_togdone(true)
            .0;
        self.registers.write(Register::MaskA.into(), mask_a)?;

        let mask_b = !InterruptB(0).with_gcrcsent(true).0;
        self.registers.write(Register::MaskB.into(), mask_b)?;

        self.select_rp(rp_current)?;

        self.registers
            .update_bits(Register::Control0.into(), Control0(0).with_int_mask(true).0, 0)?;

        self.set_vconn(false)?;

        self.registers.write(Register::Power.into(), Power::all().0)
    }

    /// Reset the PD logic of the chip, and invalidate cached registers.
    pub fn pd_reset(&mut self) -> Result<(), R::Error> {
        self.registers
            .write(Register::Reset.into(), Reset(0).with_pd_reset(true).0)?;
        self.registers.reinit_cache();
        Ok(())
    }

    /// Select the advertised pull-up current, and the matching comparator thresholds.
    pub fn select_rp(&mut self, rp_current: RpCurrent) -> Result<(), R::Error> {
        let (high, low) = rp_current.thresholds();
        self.measure_high = high;
        self.measure_low = low;

        let control0 = Control0(self.registers.read(Register::Control0.into())?).with_host_cur(rp_current.host_current());
        self.registers.write(Register::Control0.into(), control0.0)
    }

    /// Read the comparator and VBUS status.
    pub fn status0(&mut self) -> Result<Status0, R::Error> {
        Ok(Status0(self.registers.read(Register::Status0.into())?))
    }

    /// Whether VBUS is above the valid threshold.
    pub fn check_vbus(&mut self) -> Result<bool, R::Error> {
        Ok(self.status0()?.vbusok())
    }

    /// Read and clear all interrupt flags.
    pub fn read_alerts(&mut self) -> Result<Alerts, R::Error> {
        Ok(Alerts {
            interrupt: Interrupt(self.registers.read(Register::Interrupt.into())?),
            interrupt_a: InterruptA(self.registers.read(Register::InterruptA.into())?),
            interrupt_b: InterruptB(self.registers.read(Register::InterruptB.into())?),
        })
    }

    /// Latch the result of the toggle logic, and stop toggling.
    pub fn latch_toggle_result(&mut self) -> Result<CcState, R::Error> {
        let status = Status1A(self.registers.read(Register::Status1A.into())?);
        let state = CcState::from_togss(status.togss());
        self.cc_state = Some(state);

        self.registers.update_bits(
            Register::Control2.into(),
            Control2(0).with_toggle(true).0,
            0,
        )?;

        Ok(state)
    }

    /// Mask or unmask the comparator change interrupt.
    pub fn mask_comp_change(&mut self, masked: bool) -> Result<(), R::Error> {
        let bit = Interrupt(0).with_comp_chng(true).0;
        self.registers
            .update_bits(Register::Mask.into(), bit, if masked { bit } else { 0 })
    }

    /// Flush the receive FIFO.
    pub fn flush_rx(&mut self) -> Result<(), R::Error> {
        self.registers
            .write(Register::Control1.into(), Control1(0).with_rx_flush(true).0)
    }

    /// Enable or disable the receiver on the active line.
    ///
    /// Enabling flushes the receive FIFO and turns on automatic GoodCRC replies.
    pub fn set_rx_enable(&mut self, enable: bool) -> Result<(), R::Error> {
        let auto_crc = Switches1(0).with_auto_crc(true).0;

        if enable {
            let measure = match self.polarity {
                Polarity::Cc1 => Switches0(0).with_meas_cc1(true).0,
                Polarity::Cc2 => Switches0(0).with_meas_cc2(true).0,
            };
            self.registers
                .update_bits(Register::Switches0.into(), Switches0::MEASURE, measure)?;
            self.flush_rx()?;
            self.registers
                .update_bits(Register::Switches1.into(), auto_crc, auto_crc)
        } else {
            self.registers
                .update_bits(Register::Switches0.into(), Switches0::MEASURE, 0)?;
            self.registers.update_bits(Register::Switches1.into(), auto_crc, 0)
        }
    }

    /// Set the roles and revision of automatically sent GoodCRC messages.
    pub fn set_msg_header(&mut self, power_role: PowerRole, data_role: DataRole) -> Result<(), R::Error> {
        let roles = Switches1(0)
            .with_power_role(power_role.into())
            .with_data_role(data_role.into());
        let role_mask = Switches1(0).with_power_role(true).with_data_role(true).0;
        self.registers
            .update_bits(Register::Switches1.into(), role_mask, roles.0)?;

        let revision_mask = Switches1(0).with_spec_rev(0x3).0;
        self.registers
            .update_bits(Register::Switches1.into(), revision_mask, Switches1(0).with_spec_rev(2).0)
    }

    /// Set only the data role of automatically sent GoodCRC messages.
    pub fn set_data_role_bit(&mut self, data_role: DataRole) -> Result<(), R::Error> {
        let bit = Switches1(0).with_data_role(true).0;
        self.registers.update_bits(
            Register::Switches1.into(),
            bit,
            Switches1(0).with_data_role(data_role.into()).0,
        )
    }

    /// Request a hard reset ordered set.
    pub fn send_hard_reset(&mut self) -> Result<(), R::Error> {
        let bit = Control3(0).with_send_hard_reset(true).0;
        self.registers.update_bits(Register::Control3.into(), bit, bit)
    }

    /// Write a message into the transmit FIFO.
    pub fn transmit(&mut self, message: &Message) -> Result<(), R::Error> {
        protocol_layer::transmit(&mut self.registers, message)
    }

    /// Read the next message from the receive FIFO.
    pub fn receive(&mut self) -> Result<Message, R::Error> {
        protocol_layer::receive(&mut self.registers)
    }
}
