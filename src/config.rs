use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DEVICE_NAME: &str = "front_door";
const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379/0";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_CAMERA_SOURCE: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 400;
const DEFAULT_CAMERA_HEIGHT: u32 = 300;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
const DEFAULT_TARGET_CLASS: &str = "person";
const DEFAULT_FRAME_SKIP: u32 = 6;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_QUIET_WINDOW_SECS: u64 = 10;
const DEFAULT_COOLDOWN_TICKS: u32 = 9;
const DEFAULT_COOLDOWN_TICK_MS: u64 = 1000;
const DEFAULT_WORKER_CADENCE_MS: u64 = 1000;
const DEFAULT_REJECT_FLASH_MS: u64 = 1000;
const DEFAULT_SOS_FLASH_MS: u64 = 1500;
const DEFAULT_ALARM_MESSAGE: &str = "Es wurde eingebrochen";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FRAMES_DIR: &str = "frames";

#[derive(Debug, Deserialize, Default)]
struct WatchpostConfigFile {
    device_name: Option<String>,
    store: Option<StoreConfigFile>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    timing: Option<TimingConfigFile>,
    secrets: Option<SecretsConfigFile>,
    remote: Option<RemoteConfigFile>,
    frames_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct StoreConfigFile {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    endpoint: Option<String>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    target_class: Option<String>,
    frame_skip: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    poll_interval_ms: Option<u64>,
    quiet_window_secs: Option<u64>,
    cooldown_ticks: Option<u32>,
    cooldown_tick_ms: Option<u64>,
    worker_cadence_ms: Option<u64>,
    reject_flash_ms: Option<u64>,
    sos_flash_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SecretsConfigFile {
    arm_toggle: Option<String>,
    sos: Option<String>,
    resize: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RemoteConfigFile {
    api_url: Option<String>,
    api_key: Option<String>,
    device_type: Option<String>,
    email: Option<String>,
    password: Option<String>,
    alarm_event_id: Option<String>,
    sos_event_id: Option<String>,
    message: Option<String>,
    timeout_secs: Option<u64>,
}

/// Configuration shared by every watchpost process.
///
/// Each binary loads it once and hands the relevant sections to the
/// components it constructs.
#[derive(Debug, Clone)]
pub struct WatchpostConfig {
    pub device_name: String,
    pub store: StoreSettings,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub timing: TimingSettings,
    pub secrets: SecretSettings,
    pub remote: RemoteSettings,
    pub frames_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub endpoint: Option<String>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub target_class: String,
    /// Process every Nth available frame while armed.
    pub frame_skip: u32,
}

#[derive(Debug, Clone)]
pub struct TimingSettings {
    pub poll_interval: Duration,
    pub quiet_window: Duration,
    pub cooldown_ticks: u32,
    pub cooldown_tick: Duration,
    pub worker_cadence: Duration,
    pub reject_flash: Duration,
    pub sos_flash: Duration,
}

/// Argon2 PHC strings for the three panel secrets.
#[derive(Clone, Default)]
pub struct SecretSettings {
    pub arm_toggle: String,
    pub sos: String,
    pub resize: String,
}

impl std::fmt::Debug for SecretSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSettings")
            .field("arm_toggle", &!self.arm_toggle.is_empty())
            .field("sos", &!self.sos.is_empty())
            .field("resize", &!self.resize.is_empty())
            .finish()
    }
}

#[derive(Clone)]
pub struct RemoteSettings {
    pub api_url: String,
    pub api_key: String,
    pub device_type: String,
    pub email: String,
    pub password: String,
    pub alarm_event_id: String,
    pub sos_event_id: String,
    pub message: String,
    pub timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            device_type: String::new(),
            email: String::new(),
            password: String::new(),
            alarm_event_id: String::new(),
            sos_event_id: String::new(),
            message: DEFAULT_ALARM_MESSAGE.to_string(),
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_url", &self.api_url)
            .field("device_type", &self.device_type)
            .field("email", &self.email)
            .field("alarm_event_id", &self.alarm_event_id)
            .field("sos_event_id", &self.sos_event_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for WatchpostConfig {
    fn default() -> Self {
        // Defaults always validate.
        Self::from_file(WatchpostConfigFile::default())
    }
}

impl WatchpostConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHPOST_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchpostConfigFile) -> Self {
        let device_name = file
            .device_name
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        let store = file.store.unwrap_or_default();
        let store = StoreSettings {
            url: store.url.unwrap_or_else(|| DEFAULT_STORE_URL.to_string()),
            timeout: Duration::from_millis(store.timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS)),
        };
        let camera = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            source: camera
                .source
                .unwrap_or_else(|| DEFAULT_CAMERA_SOURCE.to_string()),
            width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            endpoint: detector.endpoint,
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
            target_class: detector
                .target_class
                .unwrap_or_else(|| DEFAULT_TARGET_CLASS.to_string()),
            frame_skip: detector.frame_skip.unwrap_or(DEFAULT_FRAME_SKIP),
        };
        let timing = file.timing.unwrap_or_default();
        let timing = TimingSettings {
            poll_interval: Duration::from_millis(
                timing.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            quiet_window: Duration::from_secs(
                timing.quiet_window_secs.unwrap_or(DEFAULT_QUIET_WINDOW_SECS),
            ),
            cooldown_ticks: timing.cooldown_ticks.unwrap_or(DEFAULT_COOLDOWN_TICKS),
            cooldown_tick: Duration::from_millis(
                timing.cooldown_tick_ms.unwrap_or(DEFAULT_COOLDOWN_TICK_MS),
            ),
            worker_cadence: Duration::from_millis(
                timing.worker_cadence_ms.unwrap_or(DEFAULT_WORKER_CADENCE_MS),
            ),
            reject_flash: Duration::from_millis(
                timing.reject_flash_ms.unwrap_or(DEFAULT_REJECT_FLASH_MS),
            ),
            sos_flash: Duration::from_millis(timing.sos_flash_ms.unwrap_or(DEFAULT_SOS_FLASH_MS)),
        };
        let secrets = file.secrets.unwrap_or_default();
        let secrets = SecretSettings {
            arm_toggle: secrets.arm_toggle.unwrap_or_default(),
            sos: secrets.sos.unwrap_or_default(),
            resize: secrets.resize.unwrap_or_default(),
        };
        let remote = file.remote.unwrap_or_default();
        let defaults = RemoteSettings::default();
        let remote = RemoteSettings {
            api_url: remote.api_url.unwrap_or(defaults.api_url),
            api_key: remote.api_key.unwrap_or(defaults.api_key),
            device_type: remote.device_type.unwrap_or(defaults.device_type),
            email: remote.email.unwrap_or(defaults.email),
            password: remote.password.unwrap_or(defaults.password),
            alarm_event_id: remote.alarm_event_id.unwrap_or(defaults.alarm_event_id),
            sos_event_id: remote.sos_event_id.unwrap_or(defaults.sos_event_id),
            message: remote.message.unwrap_or(defaults.message),
            timeout: remote
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };
        let frames_dir = file
            .frames_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMES_DIR));
        Self {
            device_name,
            store,
            camera,
            detector,
            timing,
            secrets,
            remote,
            frames_dir,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(name) = non_empty_env("WATCHPOST_DEVICE_NAME") {
            self.device_name = name;
        }
        if let Some(url) = non_empty_env("WATCHPOST_STORE_URL") {
            self.store.url = url;
        }
        if let Some(source) = non_empty_env("WATCHPOST_CAMERA_SOURCE") {
            self.camera.source = source;
        }
        if let Some(url) = non_empty_env("WATCHPOST_API_URL") {
            self.remote.api_url = url;
        }
        if let Some(password) = non_empty_env("WATCHPOST_API_PASSWORD") {
            self.remote.password = password;
        }
        if let Some(dir) = non_empty_env("WATCHPOST_FRAMES_DIR") {
            self.frames_dir = PathBuf::from(dir);
        }
        if let Some(window) = non_empty_env("WATCHPOST_QUIET_WINDOW_SECS") {
            let seconds: u64 = window.trim().parse().map_err(|_| {
                anyhow!("WATCHPOST_QUIET_WINDOW_SECS must be an integer number of seconds")
            })?;
            self.timing.quiet_window = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.device_name.trim().is_empty() {
            return Err(anyhow!("device_name must not be empty"));
        }
        check_unit_interval("detector.confidence_threshold", self.detector.confidence_threshold)?;
        check_unit_interval("detector.nms_threshold", self.detector.nms_threshold)?;
        if self.detector.frame_skip == 0 {
            return Err(anyhow!("detector.frame_skip must be at least 1"));
        }
        if self.timing.cooldown_ticks == 0 {
            return Err(anyhow!("timing.cooldown_ticks must be at least 1"));
        }
        for (name, value) in [
            ("timing.poll_interval_ms", self.timing.poll_interval),
            ("timing.cooldown_tick_ms", self.timing.cooldown_tick),
            ("timing.worker_cadence_ms", self.timing.worker_cadence),
        ] {
            if value.is_zero() {
                return Err(anyhow!("{} must be greater than zero", name));
            }
        }
        let api_url = self.remote.api_url.trim();
        if !api_url.is_empty() && !api_url.ends_with('/') {
            self.remote.api_url = format!("{}/", api_url);
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchpostConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within 0..=1 (got {})", name, value));
    }
    Ok(())
}
