use anyhow::Result;

use super::{CapturedFrame, FrameSource};

const DEFAULT_SCENE_LENGTH: u64 = 50;

/// Synthetic camera.
///
/// Renders a flat scene that changes every `scene_length` frames, so a
/// change-driven detector sees "someone" arrive at each scene boundary.
pub struct StubSource {
    width: u32,
    height: u32,
    scene_length: u64,
    frame_count: u64,
}

impl StubSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            scene_length: DEFAULT_SCENE_LENGTH,
            frame_count: 0,
        }
    }

    pub fn with_scene_length(mut self, frames: u64) -> Self {
        self.scene_length = frames.max(1);
        self
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_count
    }

    fn scene_shade(&self) -> u8 {
        let scene = self.frame_count / self.scene_length;
        (scene.wrapping_mul(37) % 256) as u8
    }
}

impl FrameSource for StubSource {
    fn describe(&self) -> String {
        format!("stub camera {}x{}", self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let shade = self.scene_shade();
        self.frame_count += 1;
        let len = self.width as usize * self.height as usize * 3;
        CapturedFrame::from_rgb(vec![shade; len], self.width, self.height)
    }

    fn skip_frame(&mut self) -> Result<()> {
        self.frame_count += 1;
        Ok(())
    }
}
