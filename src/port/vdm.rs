//! Automatic discovery of the DisplayPort alternate mode, run as DFP while a contract is in place.
//!
//! Every step sends one structured VDM and waits for the partner's answer. The answer itself is
//! handled in [`Port::process_vdm`] when it arrives, which leaves a mark for the running step.
//! A NAK, a failed transmission or a timeout stops the discovery, but leaves the contract alone.
use fusb302_pd_traits::{Board, RegisterAccess};
use heapless::Vec;

use super::{Events, Port, PortError, Step, TxState, VdmState};
use crate::device_policy_manager::DevicePolicyManager;
use crate::protocol_layer::message::header::DataMessageType;
use crate::protocol_layer::message::vendor_defined::{
    DISPLAYPORT_SID, DisplayPortCapabilities, DisplayPortConfig, DisplayPortStatus, PD_SID, SvidPair, VdmCommand,
    VdmCommandType, VdmHeaderStructured, VdmType, choose_pin_assignment,
};
use crate::timers::TimerType;

/// Six objects with two SVIDs each.
const MAX_SVIDS: usize = 12;

/// Progress of the discovery.
#[derive(Debug, Clone, Default)]
pub(crate) struct Vdm {
    pub(crate) state: VdmState,
    /// Progress of the exchange of the current step.
    pub(crate) step: Step,
    vdm_id: u32,
    svids: Vec<u16, MAX_SVIDS>,
    /// The SVID whose modes are discovered next.
    mode_index: usize,
    /// The partner acknowledged the request of the current step.
    acknowledged: bool,
    dp_capabilities: DisplayPortCapabilities,
}

impl Vdm {
    /// Forget the progress within a step. Happens on every state change of the port.
    pub(crate) fn reset_progress(&mut self) {
        self.mode_index = 0;
        self.acknowledged = false;
    }
}

/// Outcome of one step.
enum Outcome {
    Pending,
    Done,
    Failed,
}

impl<R: RegisterAccess, B: Board, DPM: DevicePolicyManager> Port<R, B, DPM> {
    /// Run the current discovery step.
    pub(super) fn auto_vdm(&mut self, events: Events) -> Result<(), PortError<R>> {
        let outcome = match self.vdm.state {
            VdmState::DiscoveryId => self.vdm_exchange(events, VdmCommand::DiscoverIdentity)?,
            VdmState::DiscoverySvid => self.vdm_exchange(events, VdmCommand::DiscoverSVIDS)?,
            VdmState::DiscoveryModes => self.vdm_discover_modes(events)?,
            VdmState::EnterMode => self.vdm_exchange(events, VdmCommand::EnterMode)?,
            VdmState::UpdateStatus => self.vdm_exchange(events, VdmCommand::DisplayPortStatus)?,
            VdmState::DpConfig => self.vdm_exchange(events, VdmCommand::DisplayPortConfig)?,
            VdmState::Notify => {
                self.notify();
                self.vdm.state = VdmState::Ready;
                return Ok(());
            }
            VdmState::Ready | VdmState::Error => return Ok(()),
        };

        match outcome {
            Outcome::Done => {
                self.vdm.state = self.vdm.state.next();
                self.request_tick();
            }
            Outcome::Failed => self.vdm.state = VdmState::Error,
            Outcome::Pending => {}
        }

        Ok(())
    }

    /// Discover the modes of every SVID, one after the other.
    fn vdm_discover_modes(&mut self, events: Events) -> Result<Outcome, PortError<R>> {
        if self.vdm.mode_index >= self.vdm.svids.len() {
            self.vdm.reset_progress();
            return Ok(Outcome::Done);
        }

        match self.vdm_exchange(events, VdmCommand::DiscoverModes)? {
            Outcome::Done => {
                self.vdm.mode_index += 1;
                self.request_tick();
                Ok(Outcome::Pending)
            }
            outcome => Ok(outcome),
        }
    }

    /// Send the request of a step, and check for the answer.
    fn vdm_exchange(&mut self, events: Events, command: VdmCommand) -> Result<Outcome, PortError<R>> {
        if self.vdm.step == Step::Entry {
            self.stage_vdm_request(command);
            self.vdm.step = Step::Transmit;
        }

        if self.vdm.step == Step::Transmit {
            match self.send()? {
                TxState::Success => {
                    self.timer_state.start(TimerType::SenderResponse);
                    self.vdm.step = Step::Wait;
                }
                TxState::Failed => {
                    warn!("VDM {:?} send failed", command);
                    self.vdm.step = Step::Entry;
                    return Ok(Outcome::Failed);
                }
                _ => return Ok(Outcome::Pending),
            }
        }

        let answered = match command {
            VdmCommand::DiscoverIdentity => self.vdm.vdm_id != 0,
            VdmCommand::DiscoverSVIDS => !self.vdm.svids.is_empty(),
            _ => self.vdm.acknowledged,
        };

        if answered {
            self.vdm.acknowledged = false;
            self.vdm.step = Step::Entry;
            Ok(Outcome::Done)
        } else if events.timer_state() {
            warn!("VDM {:?} timed out", command);
            self.vdm.step = Step::Entry;
            self.request_tick();
            Ok(Outcome::Failed)
        } else {
            Ok(Outcome::Pending)
        }
    }

    /// Stage the request of a step, and forget the results of an earlier attempt.
    fn stage_vdm_request(&mut self, command: VdmCommand) {
        let mut objects: Vec<u32, 2> = Vec::new();

        let header = match command {
            VdmCommand::DiscoverIdentity => {
                self.vdm.vdm_id = 0;
                VdmHeaderStructured::request(PD_SID, 0, command)
            }
            VdmCommand::DiscoverSVIDS => {
                self.vdm.svids.clear();
                VdmHeaderStructured::request(PD_SID, 0, command)
            }
            VdmCommand::DiscoverModes => {
                let svid = self.vdm.svids.get(self.vdm.mode_index).copied().unwrap_or_default();
                VdmHeaderStructured::request(svid, 0, command)
            }
            VdmCommand::EnterMode => {
                self.notifier.current.is_enter_mode = false;
                VdmHeaderStructured::request(DISPLAYPORT_SID, 1, command)
            }
            VdmCommand::DisplayPortStatus => {
                let status = DisplayPortStatus::default().with_connected(1).with_power_low(true);
                let _ = objects.push(status.0);
                VdmHeaderStructured::request(DISPLAYPORT_SID, 1, command)
            }
            VdmCommand::DisplayPortConfig => {
                let current = &mut self.notifier.current;
                current.pin_assignment_def =
                    choose_pin_assignment(self.vdm.dp_capabilities, DisplayPortStatus(current.dp_status));

                let config = DisplayPortConfig::default()
                    .with_pin_assignment(current.pin_assignment_def)
                    .with_signaling(1)
                    .with_select_configuration(2);
                debug!("DisplayPort configuration {:#010x}", config.0);

                let _ = objects.push(config.0);
                VdmHeaderStructured::request(DISPLAYPORT_SID, 1, command)
            }
            _ => VdmHeaderStructured::request(PD_SID, 0, command),
        };

        let mut payload: Vec<u32, 3> = Vec::new();
        let _ = payload.push(header.0);
        let _ = payload.extend_from_slice(&objects);

        self.stage_data(DataMessageType::VendorDefined, &payload);
    }

    /// Handle a received VDM.
    pub(super) fn process_vdm(&mut self) {
        let header = self.received_vdm_header();

        if header.vdm_type() == VdmType::Unstructured {
            warn!("Unknown unstructured VDM");
            return;
        }

        match header.command_type() {
            VdmCommandType::InitiatorREQ => match header.command() {
                VdmCommand::Attention => {
                    let current = &mut self.notifier.current;
                    current.dp_status = self.received.object(1);
                    current.attention = true;
                    info!("Attention, DisplayPort status {:#x}", current.dp_status);
                    self.notify();
                }
                command => warn!("Unknown VDM request {:?}", command),
            },
            VdmCommandType::ResponderACK => self.process_vdm_ack(header.command()),
            VdmCommandType::ResponderNAK => {
                warn!("NAK for VDM {:?}", header.command());
                self.vdm.state = VdmState::Error;
            }
            VdmCommandType::ResponderBSY => {}
        }
    }

    fn process_vdm_ack(&mut self, command: VdmCommand) {
        match command {
            VdmCommand::DiscoverIdentity => self.vdm.vdm_id = self.received.object(1),
            VdmCommand::DiscoverSVIDS => {
                for index in 1..=6 {
                    let pair = SvidPair(self.received.object(index));

                    if pair.svid0() == 0 {
                        break;
                    }
                    let _ = self.vdm.svids.push(pair.svid0());

                    if pair.svid1() == 0 {
                        break;
                    }
                    let _ = self.vdm.svids.push(pair.svid1());
                }
            }
            VdmCommand::DiscoverModes => {
                // Without a mode object, the step times out.
                if self.received.header.num_objects() > 1 {
                    let capabilities = DisplayPortCapabilities(self.received.object(1));

                    if !capabilities.has_no_pins() {
                        self.vdm.dp_capabilities = capabilities;
                        let current = &mut self.notifier.current;
                        current.pin_assignment_def = 0;
                        current.pin_assignment_support = capabilities.pin_capabilities();
                        debug!("DisplayPort capabilities {:#010x}", capabilities.0);
                    }

                    self.vdm.acknowledged = true;
                }
            }
            VdmCommand::EnterMode => self.vdm.acknowledged = true,
            VdmCommand::DisplayPortStatus => {
                self.notifier.current.dp_status = self.received.object(1);
                debug!("DisplayPort status {:#010x}", self.received.object(1));
                self.vdm.acknowledged = true;
            }
            VdmCommand::DisplayPortConfig => {
                self.vdm.acknowledged = true;
                info!(
                    "DisplayPort configured, pin assignment {:#x}",
                    self.notifier.current.pin_assignment_def
                );
                self.notifier.current.is_enter_mode = true;
            }
            _ => {}
        }
    }
}
