//! Fake remote alarm backend for integration tests.

#![allow(dead_code)]

use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tiny_http::{Method, Response, Server, StatusCode};

#[derive(Clone, Debug)]
pub struct Recorded {
    pub path: String,
    pub session_header: Option<String>,
    pub body: String,
}

pub struct FakeBackend {
    pub api_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl FakeBackend {
    /// Serves `POST /api/system/session` with the given status/body and
    /// `POST /api/events/{id}/episodes` with `episode_status`.
    pub fn start(login_status: u16, login_body: &str, episode_status: u16) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake backend"));
        let addr: SocketAddr = server.server_addr().to_ip().expect("ip listener");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let login_body = login_body.to_string();
        let handle = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let path = request.url().to_string();
                    let session_header = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("sessionId"))
                        .map(|h| h.value.as_str().to_string());
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let is_post = *request.method() == Method::Post;
                    requests.lock().expect("requests").push(Recorded {
                        path: path.clone(),
                        session_header,
                        body,
                    });

                    let response = if is_post && path.starts_with("/api/system/session") {
                        Response::from_string(login_body.clone())
                            .with_status_code(StatusCode(login_status))
                    } else if is_post && path.starts_with("/api/events/") && path.ends_with("/episodes") {
                        Response::from_string("{}").with_status_code(StatusCode(episode_status))
                    } else {
                        Response::from_string("not found").with_status_code(StatusCode(404))
                    };
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            api_url: format!("http://{}/api/", addr),
            requests,
            server,
            handle: Some(handle),
        }
    }

    pub fn ok() -> Self {
        Self::start(200, r#"{"sessionId":"sess-1","user":{"id":7}}"#, 201)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn episode_paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with("/episodes"))
            .map(|r| r.path)
            .collect()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Remote settings pointing at a fake backend.
pub fn remote_settings(api_url: &str) -> watchpost::config::RemoteSettings {
    watchpost::config::RemoteSettings {
        api_url: api_url.to_string(),
        api_key: "key-123".to_string(),
        device_type: "panel".to_string(),
        email: "ops@example.com".to_string(),
        password: "s3cret".to_string(),
        alarm_event_id: "42".to_string(),
        sos_event_id: "43".to_string(),
        ..watchpost::config::RemoteSettings::default()
    }
}
