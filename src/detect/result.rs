use serde::Deserialize;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Candidate boxes, unfiltered.
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// A candidate box in normalized 0..1 coordinates (top-left origin).
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    pub class: ObjectClass,
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ObjectClass {
    Person,
    Vehicle,
    Animal,
    Package,
    Unknown,
}

impl ObjectClass {
    /// Maps a detector label (COCO style names) to a class.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "person" | "people" | "pedestrian" => ObjectClass::Person,
            "car" | "truck" | "bus" | "motorcycle" | "motorbike" | "vehicle" => {
                ObjectClass::Vehicle
            }
            "dog" | "cat" | "bird" | "horse" | "animal" => ObjectClass::Animal,
            "package" | "box" | "suitcase" | "backpack" => ObjectClass::Package,
            _ => ObjectClass::Unknown,
        }
    }
}

impl From<String> for ObjectClass {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_classes() {
        assert_eq!(ObjectClass::from_label("person"), ObjectClass::Person);
        assert_eq!(ObjectClass::from_label(" Person "), ObjectClass::Person);
        assert_eq!(ObjectClass::from_label("truck"), ObjectClass::Vehicle);
        assert_eq!(ObjectClass::from_label("toaster"), ObjectClass::Unknown);
    }
}
