use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult, ObjectClass};
use crate::ingest::CapturedFrame;

const STUB_CONFIDENCE: f32 = 0.85;

/// Stub backend for testing and demos.
///
/// Hashes the pixels and reports a single full-frame person whenever the
/// image differs from the previous one.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &CapturedFrame) -> Result<DetectionResult> {
        let current_hash: [u8; 32] = Sha256::digest(&frame.pixels).into();

        let changed = match self.last_hash {
            Some(prev) => prev != current_hash,
            None => false,
        };

        self.last_hash = Some(current_hash);

        if !changed {
            return Ok(DetectionResult::default());
        }
        Ok(DetectionResult::new(vec![Detection {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
            confidence: STUB_CONFIDENCE,
            class: ObjectClass::Person,
        }]))
    }
}
