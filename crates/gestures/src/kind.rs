use gestura_events::{event_names, MicStatus, MicStatusEvent};
use serde::{Deserialize, Serialize};

/// Every gesture the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    OkSign,
    PinkyUp,
    ThumbsUp,
    ThumbsDown,
    OpenPalm,
    MicOn,
    MicOff,
}

impl GestureKind {
    /// Wire event name sent to clients.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::OkSign => event_names::OK_SIGN_DETECTED,
            Self::PinkyUp => event_names::PINKY_REACTION,
            Self::ThumbsUp => event_names::START_RECORDING,
            Self::ThumbsDown => event_names::STOP_RECORDING,
            Self::OpenPalm => event_names::TAKE_SCREENSHOT,
            Self::MicOn | Self::MicOff => event_names::MIC_STATUS,
        }
    }

    /// Mic direction for the latched kinds.
    pub fn mic_status(self) -> Option<MicStatus> {
        match self {
            Self::MicOn => Some(MicStatus::On),
            Self::MicOff => Some(MicStatus::Off),
            _ => None,
        }
    }

    /// Wire payload: `{"status": ..}` for mic kinds, `{}` otherwise.
    pub fn payload(self) -> serde_json::Value {
        match self.mic_status() {
            Some(status) => serde_json::to_value(MicStatusEvent { status })
                .unwrap_or_else(|_| serde_json::json!({})),
            None => serde_json::json!({}),
        }
    }
}
