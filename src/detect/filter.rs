use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::detect::result::{Detection, DetectionResult, ObjectClass};

/// Decides whether a detector result contains a qualifying detection.
///
/// A candidate qualifies when its confidence exceeds the threshold, it
/// survives greedy non-max suppression against all other candidates, and its
/// class is the target class.
#[derive(Clone, Debug)]
pub struct DetectionFilter {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub target: ObjectClass,
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f32, nms_threshold: f32, target: ObjectClass) -> Self {
        Self {
            confidence_threshold,
            nms_threshold,
            target,
        }
    }

    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        let target = ObjectClass::from_label(&settings.target_class);
        if target == ObjectClass::Unknown {
            return Err(anyhow!(
                "unsupported detector target class '{}'",
                settings.target_class
            ));
        }
        Ok(Self::new(
            settings.confidence_threshold,
            settings.nms_threshold,
            target,
        ))
    }

    /// Candidates above the confidence threshold that survive suppression,
    /// highest confidence first. Suppression runs across all classes.
    pub fn suppress(&self, result: &DetectionResult) -> Vec<Detection> {
        let mut candidates: Vec<&Detection> = result
            .detections
            .iter()
            .filter(|d| d.confidence > self.confidence_threshold)
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::new();
        for candidate in candidates {
            if kept
                .iter()
                .all(|k| iou(k, candidate) <= self.nms_threshold)
            {
                kept.push(candidate.clone());
            }
        }
        kept
    }

    /// The strongest surviving detection of the target class, if any.
    pub fn qualify(&self, result: &DetectionResult) -> Option<Detection> {
        self.suppress(result)
            .into_iter()
            .find(|d| d.class == self.target)
    }
}

/// Intersection over union of two boxes.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.w).min(b.x + b.w);
    let bottom = (a.y + a.h).min(b.y + b.h);
    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}
