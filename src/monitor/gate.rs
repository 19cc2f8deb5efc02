use anyhow::Result;
use std::time::Duration;

use crate::store::{FrameRecord, SharedStore, TriggerRecords};

/// Outcome of a detection passing through the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Published,
    /// The system was disarmed while the gate waited.
    Suppressed,
}

/// Rate limits publications to roughly one per quiet window.
///
/// The time already spent on inference counts against the window, so the
/// spacing between publications stays close to `quiet_window` no matter how
/// slow the detector is.
#[derive(Clone, Debug)]
pub struct DebounceGate {
    quiet_window: Duration,
}

impl DebounceGate {
    pub fn new(quiet_window: Duration) -> Self {
        Self { quiet_window }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Part of the quiet window still to wait after `inference`.
    pub fn remaining(&self, inference: Duration) -> Duration {
        self.quiet_window.saturating_sub(inference)
    }

    /// Waits out the quiet window, re-checks the armed flag and publishes.
    ///
    /// The device identity and the frame are two separate writes; readers
    /// may briefly see one without the other.
    pub fn pass(
        &self,
        store: &dyn SharedStore,
        inference: Duration,
        device: &str,
        image: &[u8],
    ) -> Result<GateDecision> {
        let remaining = self.remaining(inference);
        if !remaining.is_zero() {
            log::debug!("quiet window: waiting {:?}", remaining);
            std::thread::sleep(remaining);
        }

        if !store.arm_state()?.is_armed() {
            log::info!("person was detected, but system was deactivated");
            return Ok(GateDecision::Suppressed);
        }

        let record = FrameRecord::encode(crate::now_timestamp(), image);
        store.publish_trigger(device, &record)?;
        log::info!("frame {} published by {}", record.timestamp, device);
        Ok(GateDecision::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, KEY_FRAME};
    use crate::ArmState;
    use std::time::Instant;

    #[test]
    fn remaining_never_goes_negative() {
        let gate = DebounceGate::new(Duration::from_millis(100));
        assert_eq!(gate.remaining(Duration::from_millis(30)), Duration::from_millis(70));
        assert_eq!(gate.remaining(Duration::from_millis(100)), Duration::ZERO);
        assert_eq!(gate.remaining(Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn slow_inference_adds_no_wait() {
        let store = InMemoryStore::new();
        store.set_arm_state(ArmState::Armed).expect("arm");
        let gate = DebounceGate::new(Duration::from_millis(200));
        let started = Instant::now();
        let decision = gate
            .pass(&store, Duration::from_millis(250), "porch", b"jpeg")
            .expect("pass");
        assert_eq!(decision, GateDecision::Published);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn disarmed_store_suppresses_publication() {
        let store = InMemoryStore::new();
        let gate = DebounceGate::new(Duration::ZERO);
        let decision = gate
            .pass(&store, Duration::ZERO, "porch", b"jpeg")
            .expect("pass");
        assert_eq!(decision, GateDecision::Suppressed);
        assert!(!store.exists(KEY_FRAME).expect("exists"));
    }
}
