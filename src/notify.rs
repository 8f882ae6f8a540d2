//! The connector state that is published to the outside.
use crate::protocol_layer::message::vendor_defined::{DisplayPortStatus, pin};
use crate::{DataRole, PowerRole};

/// Orientation of the plug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Not connected.
    #[default]
    None,
    /// Communication on CC1.
    Cc1,
    /// Communication on CC2, the plug is flipped.
    Cc2,
}

/// Snapshot of the port, as published to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notification {
    /// Plug orientation.
    pub orientation: Orientation,
    /// Present power role.
    pub power_role: PowerRole,
    /// Present data role.
    pub data_role: DataRole,
    /// A partner is attached.
    pub is_cc_connected: bool,
    /// A power contract is established.
    pub is_pd_connected: bool,
    /// The DisplayPort alternate mode was entered.
    pub is_enter_mode: bool,
    /// Pin assignments that the partner supports.
    pub pin_assignment_support: u8,
    /// The configured pin assignment.
    pub pin_assignment_def: u8,
    /// The partner sent an attention message.
    pub attention: bool,
    /// Last DisplayPort status of the partner.
    pub dp_status: u32,
}

/// USB and DisplayPort state that follows from a [`Notification`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectorState {
    /// Something is plugged in.
    pub plugged: bool,
    /// The plug is flipped.
    pub flipped: bool,
    /// Act as USB device.
    pub usb_device: bool,
    /// Act as USB host.
    pub usb_host: bool,
    /// DisplayPort is active, with the hot plug detect level high.
    pub display_port: bool,
    /// SuperSpeed lanes are available for USB.
    pub super_speed: bool,
}

impl Notification {
    /// Derive the state of the connector's USB and DisplayPort functions.
    pub fn connector_state(&self) -> ConnectorState {
        let mut state = ConnectorState {
            plugged: self.is_cc_connected || self.is_pd_connected,
            flipped: self.orientation == Orientation::Cc2,
            ..Default::default()
        };

        if self.is_enter_mode {
            state.usb_host = true;
            state.super_speed = self.pin_assignment_def & pin::MULTI_FUNCTION != 0;
            state.display_port = DisplayPortStatus(self.dp_status).hpd_state();
        } else if self.data_role == DataRole::Dfp {
            state.usb_host = true;
            state.super_speed = true;
        } else if state.plugged {
            state.usb_device = true;
            state.super_speed = true;
        }

        state
    }
}

/// Keeps the last published snapshot, to publish changes only.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Notifier {
    pub(crate) current: Notification,
    shadow: Notification,
}

impl Notifier {
    /// Return the snapshot to publish, if it differs from the last published one.
    ///
    /// Attention is a one-shot flag. It is part of the returned snapshot, but cleared afterwards.
    pub(crate) fn take_changed(&mut self) -> Option<Notification> {
        if self.current == self.shadow {
            return None;
        }

        let changed = self.current;
        debug!("Notify {:?}", changed);

        self.current.attention = false;
        self.shadow = self.current;
        Some(changed)
    }

    /// Reset to the default snapshot.
    pub(crate) fn clear(&mut self) {
        self.current = Notification::default();
    }
}
