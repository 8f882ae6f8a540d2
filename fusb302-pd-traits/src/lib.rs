//! Hardware traits for the FUSB302 port controller core.
//!
//! Provides the register transport, board actuators and interrupt line that a platform has to
//! implement, so that the core can drive a FUSB302 on any bus and board.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
use core::fmt::Debug;
use core::future::Future;

/// Register transport towards the port controller.
///
/// All accesses are synchronous. Bus failures are reported through [`RegisterAccess::Error`]
/// and are propagated by the core, never swallowed.
pub trait RegisterAccess {
    /// Bus error type of the transport.
    type Error: Debug;

    /// Read a single register.
    fn read(&mut self, address: u8) -> Result<u8, Self::Error>;

    /// Write a single register.
    fn write(&mut self, address: u8, value: u8) -> Result<(), Self::Error>;

    /// Update the bits selected by `mask` with `value`.
    fn update_bits(&mut self, address: u8, mask: u8, value: u8) -> Result<(), Self::Error> {
        let current = self.read(address)?;
        let updated = (current & !mask) | (value & mask);

        if updated != current {
            self.write(address, updated)?;
        }

        Ok(())
    }

    /// Read consecutive bytes from a single address, e.g. the FIFO.
    fn raw_read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write consecutive bytes to a single address, e.g. the FIFO.
    fn raw_write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Invalidate any cached register content.
    ///
    /// Called after the protocol logic of the controller was reset.
    fn reinit_cache(&mut self) {}
}

/// Board-level actuators around the port controller.
pub trait Board {
    /// Switch the VBUS supplies. `vbus_5v` is the default 5 V rail, `vbus_other` any other rail.
    fn set_vbus(&mut self, vbus_5v: bool, vbus_other: bool);

    /// Whether the 5 V VBUS rail is currently switched on.
    fn vbus_5v_enabled(&self) -> bool;

    /// Drive the VBUS discharge path.
    fn set_discharge(&mut self, on: bool);

    /// Busy-wait for the given number of microseconds.
    fn delay_us(&mut self, microseconds: u32);

    /// Wait for the given number of milliseconds.
    fn delay_ms(&mut self, milliseconds: u32);
}

/// The (active low) interrupt line of the port controller.
pub trait InterruptLine {
    /// Whether the controller currently asserts its interrupt output.
    fn is_asserted(&mut self) -> bool;

    /// Enable or disable interrupt delivery for this line.
    fn set_enabled(&mut self, enabled: bool);

    /// Wait until the line is asserted.
    fn wait_for_interrupt(&mut self) -> impl Future<Output = ()>;
}
