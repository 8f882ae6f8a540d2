//! States of the port.

/// Connection and policy states of a port.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// Parked, until the partner detaches.
    Disabled,
    /// Restarts detection from scratch.
    ErrorRecovery,
    Unattached,
    AttachWaitSink,
    AttachWaitSource,
    AttachWaitAudioAccessory,
    AttachTrySource,
    AttachTrySink,
    AttachedSource,
    AttachedSink,
    AttachedAudioAccessory,

    // Source policy.
    SrcStartup,
    SrcDiscovery,
    SrcSendCapabilities,
    SrcNegotiateCapability,
    SrcTransitionSupply,
    SrcCapabilityResponse,
    SrcTransitionToDefault,
    SrcReady,
    SrcGetSinkCapabilities,
    SrcSendHardReset,
    SrcSendSoftReset,
    SrcSoftReset,

    // Sink policy.
    SnkStartup,
    SnkDiscovery,
    SnkWaitForCapabilities,
    SnkEvaluateCapabilities,
    SnkSelectCapability,
    SnkTransitionSink,
    SnkTransitionToDefault,
    SnkReady,
    SnkSendHardReset,
    SnkSendSoftReset,
    SnkSoftReset,

    // Power role swap.
    SrcPrsEvaluate,
    SnkPrsEvaluate,
    SrcPrsAccept,
    SnkPrsAccept,
    SrcPrsReject,
    SnkPrsReject,
    SrcPrsTransitionToOff,
    SrcPrsAssertRd,
    SrcPrsSourceOff,
    SrcPrsSendSwap,
    SnkPrsSendSwap,
    SnkPrsTransitionToOff,
    SnkPrsAssertRp,
    SnkPrsSourceOn,

    // VCONN swap.
    VcsUfpEvaluateSwap,
    VcsUfpAccept,
    VcsUfpReject,
    VcsUfpWaitForDfpVconn,
    VcsUfpTurnOffVconn,
    VcsUfpTurnOnVconn,
    VcsUfpSendPsRdy,
    VcsDfpSendSwap,
    VcsDfpWaitForUfpVconn,
    VcsDfpTurnOffVconn,
    VcsDfpTurnOnVconn,
    VcsDfpSendPsRdy,

    // Data role swap.
    DrsUfpEvaluate,
    DrsDfpEvaluate,
    DrsUfpAccept,
    DrsDfpAccept,
    DrsUfpReject,
    DrsDfpReject,
    DrsUfpChange,
    DrsDfpChange,
    DrsUfpSendSwap,
    DrsDfpSendSwap,
}

impl State {
    /// Whether an explicit contract is in place and no message sequence is running.
    pub fn is_ready(self) -> bool {
        matches!(self, State::SrcReady | State::SnkReady)
    }
}

/// Progress within a state that takes several ticks. Reset on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Step {
    /// Entry actions are pending.
    #[default]
    Entry,
    /// The staged message is in flight.
    Transmit,
    /// Waiting for a response, a timer or VBUS.
    Wait,
    /// Waiting for a supply to settle.
    Settle,
    /// A second message is in flight.
    TransmitFinal,
}

/// Result of the transmission in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TxState {
    /// Nothing was sent yet.
    #[default]
    Idle,
    /// Waiting for the chip to report the outcome.
    Busy,
    /// Acknowledged by the partner.
    Success,
    /// Not acknowledged after all retries.
    Failed,
}

/// States of the DisplayPort discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VdmState {
    /// Discover the partner's identity.
    #[default]
    DiscoveryId,
    /// Discover the partner's SVIDs.
    DiscoverySvid,
    /// Discover the modes of every SVID.
    DiscoveryModes,
    /// Enter the DisplayPort mode.
    EnterMode,
    /// Fetch the DisplayPort status.
    UpdateStatus,
    /// Configure the pin assignment.
    DpConfig,
    /// Publish the result.
    Notify,
    /// Done.
    Ready,
    /// Stopped after a rejection or timeout. The contract is not affected.
    Error,
}

impl VdmState {
    /// The state that follows a successful step.
    pub(crate) fn next(self) -> Self {
        match self {
            VdmState::DiscoveryId => VdmState::DiscoverySvid,
            VdmState::DiscoverySvid => VdmState::DiscoveryModes,
            VdmState::DiscoveryModes => VdmState::EnterMode,
            VdmState::EnterMode => VdmState::UpdateStatus,
            VdmState::UpdateStatus => VdmState::DpConfig,
            VdmState::DpConfig => VdmState::Notify,
            VdmState::Notify | VdmState::Ready => VdmState::Ready,
            VdmState::Error => VdmState::Error,
        }
    }

    /// Whether discovery still has steps to run.
    pub fn is_pending(self) -> bool {
        !matches!(self, VdmState::Ready | VdmState::Error)
    }
}
