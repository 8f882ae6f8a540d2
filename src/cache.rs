//! A register cache in front of a register transport.
//!
//! Configuration registers are served from the cache, which saves bus traffic in the
//! read-modify-write sequences of the port logic. Status, interrupt and self-clearing registers
//! always go to the device.
use core::fmt::Debug;

use fusb302_pd_traits::RegisterAccess;

use crate::registers::{Register, is_volatile, is_writable};

const CACHE_SIZE: usize = Register::Control4 as usize + 1;

/// Errors of the register cache.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheError<E: Debug> {
    /// The transport failed.
    #[error("transport failure: {0:?}")]
    Transport(E),
    /// The register can not be written.
    #[error("register `{0:#x}` is read-only")]
    ReadOnly(u8),
}

/// Caches non-volatile registers of the wrapped transport.
#[derive(Debug)]
pub struct RegisterCache<T> {
    inner: T,
    values: [Option<u8>; CACHE_SIZE],
}

impl<T: RegisterAccess> RegisterCache<T> {
    /// Wrap a transport, with an empty cache.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            values: [None; CACHE_SIZE],
        }
    }

    /// The wrapped transport.
    pub fn inner(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap the transport.
    pub fn release(self) -> T {
        self.inner
    }

    fn slot(&mut self, address: u8) -> Option<&mut Option<u8>> {
        if is_volatile(address) {
            None
        } else {
            self.values.get_mut(usize::from(address))
        }
    }
}

impl<T: RegisterAccess> RegisterAccess for RegisterCache<T> {
    type Error = CacheError<T::Error>;

    fn read(&mut self, address: u8) -> Result<u8, Self::Error> {
        if let Some(Some(value)) = self.slot(address).map(|slot| *slot) {
            return Ok(value);
        }

        let value = self.inner.read(address).map_err(CacheError::Transport)?;
        if let Some(slot) = self.slot(address) {
            *slot = Some(value);
        }

        Ok(value)
    }

    fn write(&mut self, address: u8, value: u8) -> Result<(), Self::Error> {
        if !is_writable(address) {
            return Err(CacheError::ReadOnly(address));
        }

        self.inner.write(address, value).map_err(CacheError::Transport)?;
        if let Some(slot) = self.slot(address) {
            *slot = Some(value);
        }

        Ok(())
    }

    fn raw_read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.raw_read(address, buffer).map_err(CacheError::Transport)
    }

    fn raw_write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        if !is_writable(address) {
            return Err(CacheError::ReadOnly(address));
        }

        self.inner.raw_write(address, data).map_err(CacheError::Transport)
    }

    fn reinit_cache(&mut self) {
        self.values = [None; CACHE_SIZE];
        self.inner.reinit_cache();
    }
}
