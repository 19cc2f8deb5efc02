//! Watchpost
//!
//! Coordination core for a small intrusion alarm made of three independent
//! processes that never talk to each other directly:
//!
//! - a presence sensor (`camera_sensor`) that samples a camera while the
//!   system is armed and publishes debounced person detections,
//! - an operator control panel (`pin_panel`) that arms, disarms and raises
//!   SOS alarms from PIN input,
//! - an alarm dispatcher (hosted by the panel process) that turns standing
//!   commands plus recorded detections into remote alarm episodes.
//!
//! All cooperation happens through a shared key-value store used as a
//! minimal message bus. No multi-key atomicity is assumed anywhere.
//!
//! # Module Structure
//!
//! - `store`: the shared store seam (`SharedStore`, redis and in-memory)
//! - `ingest`: frame sources
//! - `detect`: detector backends and detection qualification
//! - `monitor`: presence monitor loop and debounce gate
//! - `panel`: PIN entry, secrets, control state machine
//! - `dispatch`: command queue and background dispatch worker
//! - `remote`: remote alarm client and local frame archive
//! - `ui`: terminal stage output and panel indicator

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod ingest;
pub mod monitor;
pub mod panel;
pub mod remote;
pub mod store;
pub mod ui;

pub use config::WatchpostConfig;
pub use detect::{BackendRegistry, Detection, DetectionFilter, DetectionResult, ObjectClass};
pub use dispatch::{
    command_queue, AlarmSubmitter, CommandReceiver, CommandSender, DispatchWorker, WorkerHandle,
};
pub use ingest::{CapturedFrame, FrameSource, StubSource};
pub use monitor::{DebounceGate, GateDecision, PollOutcome, PresenceMonitor};
pub use panel::{ConfirmOutcome, ControlPanel, Indicator, Key, PinEntry, SecretSet};
pub use remote::{FrameArchive, RemoteAlarmClient, SubmissionOutcome};
pub use store::{FrameRecord, InMemoryStore, RedisStore, SharedStore};

/// Timestamp format used for published frames and persisted file names.
pub const FRAME_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Armed flag shared through the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArmState {
    #[default]
    Disarmed,
    Armed,
}

impl ArmState {
    pub fn as_flag(self) -> u8 {
        match self {
            ArmState::Disarmed => 0,
            ArmState::Armed => 1,
        }
    }

    /// Parses the stored flag. Anything other than `1` reads as disarmed.
    pub fn from_flag(raw: &str) -> Self {
        match raw.trim() {
            "1" => ArmState::Armed,
            _ => ArmState::Disarmed,
        }
    }

    pub fn is_armed(self) -> bool {
        self == ArmState::Armed
    }
}

/// Command handed from the control panel to the dispatch worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlarmCommand {
    /// No standing alarm (disarmed).
    #[default]
    None,
    /// Armed: detections recorded in the store raise the standard alarm.
    Standard,
    /// One-shot silent alarm.
    Sos,
}

impl AlarmCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmCommand::None => "none",
            AlarmCommand::Standard => "alarm",
            AlarmCommand::Sos => "sos",
        }
    }
}

impl std::fmt::Display for AlarmCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local wall-clock timestamp in `FRAME_TIMESTAMP_FORMAT`.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(FRAME_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_state_flag_roundtrip_is_lenient() {
        assert_eq!(ArmState::from_flag("1"), ArmState::Armed);
        assert_eq!(ArmState::from_flag(" 1\n"), ArmState::Armed);
        assert_eq!(ArmState::from_flag("0"), ArmState::Disarmed);
        assert_eq!(ArmState::from_flag("garbage"), ArmState::Disarmed);
        assert_eq!(ArmState::Armed.as_flag(), 1);
        assert_eq!(ArmState::Disarmed.as_flag(), 0);
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), "2024_01_01_00_00_00".len());
        assert_eq!(ts.matches('_').count(), 5);
    }
}
