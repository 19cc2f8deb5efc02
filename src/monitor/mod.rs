//! Presence monitor.
//!
//! Polls the shared store for the armed flag. While armed it samples the
//! camera at a reduced rate, runs the detector and hands qualifying person
//! detections to the [`DebounceGate`], which decides whether a frame gets
//! published. While disarmed no frame is captured and no inference runs.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::WatchpostConfig;
use crate::detect::{BackendRegistry, DetectionFilter};
use crate::ingest::FrameSource;
use crate::store::{SharedStore, TriggerRecords};
use crate::ArmState;

mod annotate;
mod gate;

pub use annotate::highlight_detection;
pub use gate::{DebounceGate, GateDecision};

/// Processes every Nth available frame.
#[derive(Clone, Debug)]
pub struct FrameSkip {
    every: u32,
    skipped: u32,
}

impl FrameSkip {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            skipped: 0,
        }
    }

    /// Returns true when the current frame should be processed.
    pub fn advance(&mut self) -> bool {
        if self.skipped + 1 >= self.every {
            self.skipped = 0;
            true
        } else {
            self.skipped += 1;
            false
        }
    }

    pub fn reset(&mut self) {
        self.skipped = 0;
    }
}

/// What a single poll iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Disarmed; nothing sampled.
    Idle,
    /// Armed, frame skipped by the sampling counter.
    Skipped,
    /// Frame analysed, nothing qualified.
    NoDetection,
    /// Qualifying detection published to the store.
    Published,
    /// Qualifying detection discarded because the system was disarmed meanwhile.
    Suppressed,
    /// Store unreachable; treated as disarmed.
    StoreUnavailable,
    SourceError,
    DetectorError,
}

pub struct PresenceMonitor {
    device_name: String,
    store: Arc<dyn SharedStore>,
    source: Box<dyn FrameSource>,
    detectors: BackendRegistry,
    filter: DetectionFilter,
    skip: FrameSkip,
    gate: DebounceGate,
    poll_interval: Duration,
    last_state: ArmState,
    store_reachable: bool,
}

impl PresenceMonitor {
    pub fn new(
        config: &WatchpostConfig,
        store: Arc<dyn SharedStore>,
        source: Box<dyn FrameSource>,
        detectors: BackendRegistry,
    ) -> Result<Self> {
        let filter = DetectionFilter::from_settings(&config.detector)?;
        Ok(Self {
            device_name: config.device_name.clone(),
            store,
            source,
            detectors,
            filter,
            skip: FrameSkip::new(config.detector.frame_skip),
            gate: DebounceGate::new(config.timing.quiet_window),
            poll_interval: config.timing.poll_interval,
            last_state: ArmState::Disarmed,
            store_reachable: true,
        })
    }

    /// Runs one poll iteration. Never fails; problems become outcomes.
    pub fn poll_once(&mut self) -> PollOutcome {
        let state = match self.store.arm_state() {
            Ok(state) => {
                if !self.store_reachable {
                    log::info!("store reachable again");
                    self.store_reachable = true;
                }
                state
            }
            Err(e) => {
                if self.store_reachable {
                    log::warn!("store unavailable, treating as disarmed: {:#}", e);
                    self.store_reachable = false;
                }
                self.observe(ArmState::Disarmed);
                return PollOutcome::StoreUnavailable;
            }
        };
        self.observe(state);

        if !state.is_armed() {
            return PollOutcome::Idle;
        }

        if !self.skip.advance() {
            if let Err(e) = self.source.skip_frame() {
                log::warn!("frame skip failed: {:#}", e);
                return PollOutcome::SourceError;
            }
            return PollOutcome::Skipped;
        }

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame capture failed: {:#}", e);
                return PollOutcome::SourceError;
            }
        };

        let started = Instant::now();
        let result = match self.detectors.detect(&frame) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("detector failed: {:#}", e);
                return PollOutcome::DetectorError;
            }
        };
        let inference = started.elapsed();
        log::debug!("inference took {:?}", inference);

        let Some(detection) = self.filter.qualify(&result) else {
            return PollOutcome::NoDetection;
        };
        log::warn!(
            "person detected (confidence {:.2})",
            detection.confidence
        );

        let image = match highlight_detection(&frame, &detection) {
            Ok(image) => image,
            Err(e) => {
                log::debug!("highlighting failed, publishing raw frame: {:#}", e);
                frame.jpeg.clone()
            }
        };

        match self
            .gate
            .pass(self.store.as_ref(), inference, &self.device_name, &image)
        {
            Ok(GateDecision::Published) => PollOutcome::Published,
            Ok(GateDecision::Suppressed) => {
                self.observe(ArmState::Disarmed);
                PollOutcome::Suppressed
            }
            Err(e) => {
                log::warn!("publishing detection failed: {:#}", e);
                PollOutcome::StoreUnavailable
            }
        }
    }

    /// Polls until `stop` is raised.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        self.source
            .connect()
            .with_context(|| format!("connect {}", self.source.describe()))?;
        log::info!(
            "{} watching {} (detector: {})",
            self.device_name,
            self.source.describe(),
            self.detectors.default_name().unwrap_or("none")
        );
        while !stop.load(Ordering::SeqCst) {
            self.poll_once();
            std::thread::sleep(self.poll_interval);
        }
        log::info!("{} stopped", self.device_name);
        Ok(())
    }

    fn observe(&mut self, state: ArmState) {
        if state != self.last_state {
            match state {
                ArmState::Armed => log::info!("system armed, sampling camera"),
                ArmState::Disarmed => log::info!("system disarmed, idling"),
            }
            self.skip.reset();
            self.last_state = state;
        }
    }
}
