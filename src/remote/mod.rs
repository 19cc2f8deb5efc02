//! Remote alarm backend.
//!
//! Each submission is a full round trip: log in, post an episode for the
//! event mapped to the command, and on success archive the latest published
//! frame locally. Nothing is cached between submissions and nothing is
//! retried here.

use std::path::PathBuf;

mod client;
mod frames;

pub use client::RemoteAlarmClient;
pub use frames::FrameArchive;

/// Result of one submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Episode created. `frame` is where the latest frame was saved, if any.
    Triggered { frame: Option<PathBuf> },
    /// Backend reports the alarm as already running.
    AlreadyActive,
    /// Backend refused the episode with this status.
    Rejected { status: u16 },
    /// Login failed or returned no session.
    SessionFailed,
    /// The episode request never got a response.
    TransportFailed,
    /// No event is mapped to the command; nothing was sent.
    Unrecognized,
}

impl SubmissionOutcome {
    pub fn is_triggered(&self) -> bool {
        matches!(self, SubmissionOutcome::Triggered { .. })
    }
}
