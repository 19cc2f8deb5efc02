use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::{FrameArchive, SubmissionOutcome};
use crate::config::{RemoteSettings, WatchpostConfig};
use crate::dispatch::AlarmSubmitter;
use crate::store::{SharedStore, TriggerRecords};
use crate::AlarmCommand;

const SUCCESS_STATUSES: [u16; 2] = [200, 201];
const ALREADY_ACTIVE_STATUS: u16 = 400;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: Option<String>,
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: serde_json::Value,
}

struct Session {
    id: String,
}

/// Client for the remote alarm backend.
pub struct RemoteAlarmClient {
    settings: RemoteSettings,
    agent: ureq::Agent,
    store: Arc<dyn SharedStore>,
    archive: FrameArchive,
}

impl RemoteAlarmClient {
    pub fn new(
        settings: &RemoteSettings,
        store: Arc<dyn SharedStore>,
        archive: FrameArchive,
    ) -> Result<Self> {
        let mut settings = settings.clone();
        if settings.api_url.trim().is_empty() {
            return Err(anyhow!("remote.api_url must be set"));
        }
        if !settings.api_url.ends_with('/') {
            settings.api_url.push('/');
        }
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        Ok(Self {
            settings,
            agent,
            store,
            archive,
        })
    }

    pub fn from_config(config: &WatchpostConfig, store: Arc<dyn SharedStore>) -> Result<Self> {
        Self::new(
            &config.remote,
            store,
            FrameArchive::new(config.frames_dir.clone()),
        )
    }

    /// Event the command maps to. Unset event ids count as unmapped.
    fn event_id(&self, command: AlarmCommand) -> Option<&str> {
        let id = match command {
            AlarmCommand::Standard => self.settings.alarm_event_id.as_str(),
            AlarmCommand::Sos => self.settings.sos_event_id.as_str(),
            AlarmCommand::None => return None,
        };
        let id = id.trim();
        (!id.is_empty()).then_some(id)
    }

    fn open_session(&self) -> Result<Session> {
        let url = format!("{}system/session?embedded=user", self.settings.api_url);
        let response = self
            .agent
            .post(&url)
            .send_form(&[
                ("apiKey", self.settings.api_key.as_str()),
                ("deviceType", self.settings.device_type.as_str()),
                ("email", self.settings.email.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => anyhow!("login refused with status {}", code),
                ureq::Error::Transport(t) => anyhow!("login request failed: {}", t),
            })?;
        let status = response.status();
        if !SUCCESS_STATUSES.contains(&status) {
            return Err(anyhow!("login answered with status {}", status));
        }
        let body = response.into_string().context("read login response")?;
        let parsed: SessionResponse =
            serde_json::from_str(&body).context("login response is not JSON")?;
        let id = parsed
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("login response has no sessionId"))?;
        if let Some(user) = parsed.user {
            log::debug!("session opened for user {}", user.id);
        }
        Ok(Session { id })
    }

    fn archive_latest_frame(&self) -> Option<PathBuf> {
        match self.store.latest_frame() {
            Ok(Some(record)) => match self.archive.persist(&record) {
                Ok(path) => {
                    log::info!("frame saved to {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    log::warn!("saving frame failed: {:#}", e);
                    None
                }
            },
            Ok(None) => {
                log::warn!("no frame in store, alarm triggered without a frame");
                None
            }
            Err(e) => {
                log::warn!("could not read frame from store: {:#}", e);
                None
            }
        }
    }
}

impl AlarmSubmitter for RemoteAlarmClient {
    fn submit(&self, command: AlarmCommand) -> SubmissionOutcome {
        let Some(event_id) = self.event_id(command) else {
            log::debug!("command '{}' not recognized, alarm not sent", command);
            return SubmissionOutcome::Unrecognized;
        };

        let session = match self.open_session() {
            Ok(session) => session,
            Err(e) => {
                log::error!("could not open backend session: {:#}", e);
                log::error!("'{}' alarm not sent", command);
                return SubmissionOutcome::SessionFailed;
            }
        };

        let url = format!("{}events/{}/episodes", self.settings.api_url, event_id);
        log::debug!("sending '{}' alarm request", command);
        let status = match self
            .agent
            .post(&url)
            .set("sessionId", &session.id)
            .send_form(&[("message", self.settings.message.as_str())])
        {
            Ok(response) => response.status(),
            Err(ureq::Error::Status(code, _)) => code,
            Err(ureq::Error::Transport(t)) => {
                log::error!("alarm request failed: {}", t);
                return SubmissionOutcome::TransportFailed;
            }
        };

        if status == ALREADY_ACTIVE_STATUS {
            log::debug!("alarm is still active");
            return SubmissionOutcome::AlreadyActive;
        }
        if !SUCCESS_STATUSES.contains(&status) {
            log::warn!("backend refused '{}' alarm with status {}", command, status);
            return SubmissionOutcome::Rejected { status };
        }

        log::info!("'{}' alarm triggered", command);
        let frame = self.archive_latest_frame();
        SubmissionOutcome::Triggered { frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn client(settings: RemoteSettings) -> Result<RemoteAlarmClient> {
        RemoteAlarmClient::new(
            &settings,
            Arc::new(InMemoryStore::new()),
            FrameArchive::new("frames"),
        )
    }

    fn settings() -> RemoteSettings {
        RemoteSettings {
            // Nothing listens here; any request would fail as a transport error.
            api_url: "http://127.0.0.1:1/api".to_string(),
            alarm_event_id: "42".to_string(),
            sos_event_id: "43".to_string(),
            ..RemoteSettings::default()
        }
    }

    #[test]
    fn api_url_is_required() {
        let mut missing = settings();
        missing.api_url = " ".to_string();
        assert!(client(missing).is_err());
    }

    #[test]
    fn commands_map_to_configured_events() {
        let client = client(settings()).expect("client");
        assert_eq!(client.event_id(AlarmCommand::Standard), Some("42"));
        assert_eq!(client.event_id(AlarmCommand::Sos), Some("43"));
        assert_eq!(client.event_id(AlarmCommand::None), None);
        assert_eq!(client.settings.api_url, "http://127.0.0.1:1/api/");
    }

    #[test]
    fn unmapped_command_makes_no_request() {
        let mut unmapped = settings();
        unmapped.sos_event_id = String::new();
        let client = client(unmapped).expect("client");
        assert_eq!(client.submit(AlarmCommand::Sos), SubmissionOutcome::Unrecognized);
        assert_eq!(client.submit(AlarmCommand::None), SubmissionOutcome::Unrecognized);
    }

    #[test]
    fn unreachable_backend_fails_the_session() {
        let client = client(settings()).expect("client");
        assert_eq!(client.submit(AlarmCommand::Standard), SubmissionOutcome::SessionFailed);
    }
}
