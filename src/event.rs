use crate::resolve::Tier;
use crate::session::{InitState, MicPermission, PanelMode};
use serde::{Deserialize, Serialize};

/// PanelEvent represents UI-facing notifications published by the panel cores.
///
/// Both the session controller and the resolution pipeline publish here; the
/// hosting layer subscribes to drive its status indicator, number field and
/// layout. Nothing blocks on a subscriber being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PanelEvent {
    /// Bootstrap state changed
    #[serde(rename = "state")]
    State(u64, InitState), // timestamp, new state

    /// Embedded/popup mode flipped
    #[serde(rename = "mode")]
    Mode(u64, PanelMode), // timestamp, new mode

    /// Microphone probe outcome
    #[serde(rename = "mic_permission")]
    MicPermission(u64, MicPermission), // timestamp, status

    /// Popup window creation was refused by the host environment
    #[serde(rename = "popup_blocked")]
    PopupBlocked(u64, String), // timestamp, reason

    /// A tier produced a dialable number
    #[serde(rename = "number_resolved")]
    NumberResolved(u64, Tier, String), // timestamp, tier, normalized number

    /// Copy acknowledgement raised or reverted
    #[serde(rename = "copy_ack")]
    CopyAck(u64, bool), // timestamp, acknowledged
}

impl PanelEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            PanelEvent::State(timestamp, _) => *timestamp,
            PanelEvent::Mode(timestamp, _) => *timestamp,
            PanelEvent::MicPermission(timestamp, _) => *timestamp,
            PanelEvent::PopupBlocked(timestamp, _) => *timestamp,
            PanelEvent::NumberResolved(timestamp, _, _) => *timestamp,
            PanelEvent::CopyAck(timestamp, _) => *timestamp,
        }
    }
}

/// Type alias for the event sender
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;
