//! Shared store seam.
//!
//! The three watchpost processes cooperate only through a key-value store.
//! The store is a plain mapping with `get`, `set`, `exists` and `flush_all`;
//! there is no multi-key atomicity, so every consumer here tolerates seeing
//! one key of a record without the other.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::StoreSettings;
use crate::ArmState;

mod memory;
mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

/// Armed flag (`"0"` / `"1"`).
pub const KEY_STATUS: &str = "trigger_status";
/// Identity of the sensor that published the latest detection.
pub const KEY_ORIGIN_DEVICE: &str = "trigger_dev";
/// Latest published frame, JSON encoded [`FrameRecord`].
pub const KEY_FRAME: &str = "frame";

/// Narrow key-value interface every store backend implements.
///
/// Implementations must be usable from several threads; per-key ordering is
/// the only guarantee callers rely on.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Removes every key.
    fn flush_all(&self) -> Result<()>;
}

/// Opens the configured store and probes it once.
///
/// An unreachable store is not an error here: every consumer already treats
/// store failures as transient and retries on its next cycle.
pub fn connect(settings: &StoreSettings) -> Result<Arc<dyn SharedStore>> {
    let store = RedisStore::open(&settings.url, settings.timeout)?;
    match store.ping() {
        Ok(()) => log::debug!("redis is available at {}", settings.url),
        Err(e) => log::warn!("redis is unavailable at {}: {:#}", settings.url, e),
    }
    Ok(Arc::new(store))
}

/// Timestamped, base64 encoded frame as stored under [`KEY_FRAME`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub timestamp: String,
    #[serde(rename = "frame", alias = "image")]
    pub image: String,
}

impl FrameRecord {
    pub fn encode(timestamp: impl Into<String>, image_bytes: &[u8]) -> Self {
        Self {
            timestamp: timestamp.into(),
            image: STANDARD.encode(image_bytes),
        }
    }

    pub fn decode_image(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.image.as_bytes())
            .context("frame image is not valid base64")
    }
}

/// Typed access to the trigger record keys on top of any [`SharedStore`].
pub trait TriggerRecords {
    fn arm_state(&self) -> Result<ArmState>;

    fn set_arm_state(&self, state: ArmState) -> Result<()>;

    fn origin_device(&self) -> Result<Option<String>>;

    fn latest_frame(&self) -> Result<Option<FrameRecord>>;

    /// Writes the device identity, then the frame, as two separate writes.
    fn publish_trigger(&self, device: &str, frame: &FrameRecord) -> Result<()>;
}

impl<S: SharedStore + ?Sized> TriggerRecords for S {
    fn arm_state(&self) -> Result<ArmState> {
        Ok(self
            .get(KEY_STATUS)?
            .map(|raw| ArmState::from_flag(&raw))
            .unwrap_or_default())
    }

    fn set_arm_state(&self, state: ArmState) -> Result<()> {
        self.set(KEY_STATUS, &state.as_flag().to_string())
    }

    fn origin_device(&self) -> Result<Option<String>> {
        self.get(KEY_ORIGIN_DEVICE)
    }

    fn latest_frame(&self) -> Result<Option<FrameRecord>> {
        let Some(raw) = self.get(KEY_FRAME)? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).context("stored frame is not a frame record")?;
        Ok(Some(record))
    }

    fn publish_trigger(&self, device: &str, frame: &FrameRecord) -> Result<()> {
        self.set(KEY_ORIGIN_DEVICE, device)?;
        let json = serde_json::to_string(frame)?;
        self.set(KEY_FRAME, &json)
    }
}
