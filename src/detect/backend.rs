use anyhow::Result;

use crate::detect::result::DetectionResult;
use crate::ingest::CapturedFrame;

/// Detector backend trait.
///
/// The detection engine itself is a black box: given a frame it returns zero
/// or more labelled candidate boxes with confidences. Qualification
/// (threshold, duplicate suppression, target class) happens afterwards in
/// [`DetectionFilter`](crate::detect::DetectionFilter), so backends should
/// return raw candidates.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &CapturedFrame) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
