//! CC line sensing and termination control.
//!
//! The comparator of the FUSB302 measures the line selected in SWITCHES0 against the MEASURE
//! threshold. With the local pull-up enabled, an open line rises above the high threshold, Rd
//! settles between both thresholds and Ra below the low one. With the local pull-downs enabled,
//! a nonzero BC_LVL reading indicates a partner pull-up.
use fusb302_pd_traits::{Board, RegisterAccess};

use crate::RoleMode;
use crate::registers::{Control2, Control4, Register, Switches0, Switches1, ToggleMode};
use crate::tcpc::{CcRole, CcVoltage, Polarity, Tcpc};

/// Settle time of the comparator after changing the measure setup.
const MEASURE_SETTLE_US: u32 = 250;

/// Retries of a pull-up measurement that found the line above the high threshold.
const OPEN_RETRIES: usize = 3;

/// Termination that the port presents on its CC lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcPull {
    /// Pull-up on the active line.
    Up,
    /// Pull-downs on both lines.
    Down,
    /// No termination.
    None,
}

fn measure_switch(line: Polarity) -> Switches0 {
    match line {
        Polarity::Cc1 => Switches0(0).with_meas_cc1(true),
        Polarity::Cc2 => Switches0(0).with_meas_cc2(true),
    }
}

fn pull_up_switch(line: Polarity) -> Switches0 {
    match line {
        Polarity::Cc1 => Switches0(0).with_pu_en1(true),
        Polarity::Cc2 => Switches0(0).with_pu_en2(true),
    }
}

impl<R: RegisterAccess, B: Board> Tcpc<R, B> {
    fn comparator_high(&mut self) -> Result<bool, R::Error> {
        self.board.delay_us(MEASURE_SETTLE_US);
        Ok(self.status0()?.comp())
    }

    /// Classify a line with the local pull-up enabled, as `Open`, `Rd` or `Ra`.
    ///
    /// The switch configuration is restored afterwards.
    pub fn measure_pull_up(&mut self, line: Polarity) -> Result<CcVoltage, R::Error> {
        let stored = self.registers.read(Register::Switches0.into())?;

        let switches = (stored & !(Switches0::MEASURE | Switches0::PULL_UP))
            | measure_switch(line).0
            | pull_up_switch(line).0;
        self.registers.write(Register::Switches0.into(), switches)?;

        self.registers.write(Register::Measure.into(), self.measure_high)?;

        let voltage = if self.comparator_high()? {
            for _ in 0..OPEN_RETRIES {
                self.registers.write(Register::Measure.into(), self.measure_high)?;
                self.comparator_high()?;
            }
            CcVoltage::Open
        } else {
            self.registers.write(Register::Measure.into(), self.measure_low)?;
            self.registers.read(Register::Measure.into())?;

            if self.comparator_high()? {
                CcVoltage::Rd
            } else {
                CcVoltage::Ra
            }
        };

        self.registers.write(Register::Switches0.into(), stored)?;
        self.registers.write(Register::Measure.into(), self.measure_high)?;

        Ok(voltage)
    }

    /// Classify a line with the local pull-downs enabled, as `Rp` or `Open`.
    pub fn measure_pull_down(&mut self, line: Polarity) -> Result<CcVoltage, R::Error> {
        let switches = Switches0::PULL_DOWN | measure_switch(line).0;
        self.registers.update_bits(
            Register::Switches0.into(),
            Switches0::MEASURE | Switches0::PULL_UP | Switches0::PULL_DOWN,
            switches,
        )?;

        self.board.delay_us(MEASURE_SETTLE_US);

        if self.status0()?.bc_lvl() != 0 {
            Ok(CcVoltage::Rp)
        } else {
            Ok(CcVoltage::Open)
        }
    }

    /// Sample both lines, as `(cc1, cc2)`.
    ///
    /// As sink, both lines are checked for a partner pull-up. As source, only the line that the
    /// toggle logic found is measured. Without a toggle result, both lines are measured with the
    /// local pull-up.
    pub fn get_cc(&mut self) -> Result<(CcVoltage, CcVoltage), R::Error> {
        match self.cc_state {
            Some(state) if state.role == CcRole::Ufp => Ok((
                self.measure_pull_down(Polarity::Cc1)?,
                self.measure_pull_down(Polarity::Cc2)?,
            )),
            Some(state) if state.role == CcRole::Dfp => {
                if state.on_cc1 {
                    Ok((self.measure_pull_up(Polarity::Cc1)?, CcVoltage::Open))
                } else {
                    Ok((CcVoltage::Open, self.measure_pull_up(Polarity::Cc2)?))
                }
            }
            _ => Ok((
                self.measure_pull_up(Polarity::Cc1)?,
                self.measure_pull_up(Polarity::Cc2)?,
            )),
        }
    }

    /// Present a termination.
    pub fn set_cc_pull(&mut self, pull: CcPull) -> Result<(), R::Error> {
        let switches = match pull {
            CcPull::Up => pull_up_switch(self.polarity).0,
            CcPull::Down => Switches0::PULL_DOWN,
            CcPull::None => 0,
        };

        self.registers.update_bits(
            Register::Switches0.into(),
            Switches0::PULL_UP | Switches0::PULL_DOWN,
            switches,
        )?;

        if pull == CcPull::Up && self.measure_high != 0 {
            self.registers.write(Register::Measure.into(), self.measure_high)?;
        }

        Ok(())
    }

    /// Configure the toggle logic for a role mode, and start toggling.
    pub fn set_cc(&mut self, mode: RoleMode) -> Result<(), R::Error> {
        let control2 = match mode {
            RoleMode::Dfp => {
                self.set_cc_pull(CcPull::Up)?;
                Control2(0).with_mode(ToggleMode::Dfp).with_tog_rd_only(true)
            }
            RoleMode::Ufp => {
                self.set_cc_pull(CcPull::Up)?;
                Control2(0).with_mode(ToggleMode::Ufp)
            }
            RoleMode::Drp => {
                self.set_cc_pull(CcPull::None)?;
                Control2(0).with_mode(ToggleMode::Drp).with_tog_rd_only(true)
            }
        };

        self.registers
            .update_bits(Register::Control2.into(), Control2::MODE_MASK, control2.0)?;

        let exit = Control4(0).with_tog_usrc_exit(true).0;
        self.registers.update_bits(Register::Control4.into(), exit, exit)?;

        let toggle = Control2(0).with_toggle(true).0;
        self.registers.update_bits(Register::Control2.into(), toggle, toggle)
    }

    /// Select the line for communication.
    ///
    /// Moves VCONN to the other line if it is enabled, and the measure block and transmitter to
    /// the selected one. Unless the port is sink, the pull-up follows the selected line.
    pub fn set_polarity(&mut self, polarity: Polarity) -> Result<(), R::Error> {
        let mut switches = Switches0(0);

        if self.vconn_enabled {
            switches = match polarity {
                Polarity::Cc1 => switches.with_vconn_cc2(true),
                Polarity::Cc2 => switches.with_vconn_cc1(true),
            };
        }

        switches.0 |= measure_switch(polarity).0;
        if self.cc_role() != Some(CcRole::Ufp) {
            switches.0 |= pull_up_switch(polarity).0;
        }

        self.registers.update_bits(
            Register::Switches0.into(),
            Switches0::VCONN | Switches0::MEASURE | Switches0::PULL_UP,
            switches.0,
        )?;

        let transmitter = match polarity {
            Polarity::Cc1 => Switches1(0).with_txcc1(true),
            Polarity::Cc2 => Switches1(0).with_txcc2(true),
        };
        self.registers
            .update_bits(Register::Switches1.into(), Switches1::TXCC, transmitter.0)?;

        self.polarity = polarity;
        Ok(())
    }

    /// Source VCONN on the line opposite to the active one.
    pub fn set_vconn(&mut self, enable: bool) -> Result<(), R::Error> {
        let switches = if enable {
            match self.polarity {
                Polarity::Cc1 => Switches0(0).with_vconn_cc2(true).0,
                Polarity::Cc2 => Switches0(0).with_vconn_cc1(true).0,
            }
        } else {
            0
        };

        self.registers
            .update_bits(Register::Switches0.into(), Switches0::VCONN, switches)?;
        self.vconn_enabled = enable;
        Ok(())
    }

    /// Whether the port sources VCONN.
    pub fn vconn_enabled(&self) -> bool {
        self.vconn_enabled
    }
}
