//! USB Type-C and USB-PD port controller core for the FUSB302.
//!
//! The crate implements CC attach detection, the USB-PD policy states of source and sink,
//! role swaps and the automatic DisplayPort alternate mode discovery. Register access, board
//! actuators and the interrupt line are provided by the platform through the traits in
//! [`fusb302_pd_traits`].
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// This must go first.
mod fmt;

#[macro_use]
extern crate uom;

pub mod cache;
pub mod cc;
pub mod config;
pub mod counters;
pub mod device_policy_manager;
pub mod irq;
pub mod notify;
pub mod port;
pub mod protocol_layer;
pub mod registers;
pub mod tcpc;
pub mod timers;
pub mod units;
pub mod worker;

#[cfg(test)]
pub mod dummy;

pub use fusb302_pd_traits::{Board, InterruptLine, RegisterAccess};

/// Errors of the port controller core.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The register transport reported a bus failure.
    #[error("register transport failure: {0:?}")]
    Transport(E),
    /// A swap was requested while the port is not in a ready state.
    #[error("port is not ready for a swap request")]
    NotReady,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Transport(error)
    }
}

/// The port's power role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerRole {
    /// Consumes power.
    #[default]
    Sink,
    /// Provides power.
    Source,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

/// The port's data role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRole {
    /// Upstream facing port (device).
    #[default]
    Ufp,
    /// Downstream facing port (host).
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

/// Role of the CC termination, as configured for toggling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoleMode {
    /// Dual role port, toggles between source and sink.
    #[default]
    Drp,
    /// Source only.
    Dfp,
    /// Sink only.
    Ufp,
}

/// Preferred role of a dual role port, see Try.SRC and Try.SNK.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TryRole {
    /// No preference.
    #[default]
    None,
    /// Try to become source.
    Source,
    /// Try to become sink.
    Sink,
}
