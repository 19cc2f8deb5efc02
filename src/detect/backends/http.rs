use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult, ObjectClass};
use crate::ingest::CapturedFrame;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend that delegates inference to an external detection service.
///
/// The service receives the frame as `image/jpeg` and answers with
/// `{"detections": [{"x", "y", "w", "h", "confidence", "label"}]}` in
/// normalized coordinates.
pub struct HttpBackend {
    endpoint: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    detections: Vec<InferenceBox>,
}

#[derive(Debug, Deserialize)]
struct InferenceBox {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    confidence: f32,
    label: ObjectClass,
}

impl HttpBackend {
    pub fn new(endpoint: &str) -> Result<Self> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(anyhow!(
                "detector endpoint must be an http(s) url, got '{}'",
                endpoint
            ));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            agent: ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build(),
        })
    }
}

impl DetectorBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn detect(&mut self, frame: &CapturedFrame) -> Result<DetectionResult> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "image/jpeg")
            .send_bytes(&frame.jpeg)
            .with_context(|| format!("inference request to {}", self.endpoint))?;
        let body = response.into_string().context("read inference response")?;
        parse_inference_response(&body)
    }
}

fn parse_inference_response(body: &str) -> Result<DetectionResult> {
    let parsed: InferenceResponse =
        serde_json::from_str(body).context("parse inference response")?;
    Ok(DetectionResult::new(
        parsed
            .detections
            .into_iter()
            .map(|b| Detection {
                x: b.x,
                y: b.y,
                w: b.w,
                h: b.h,
                confidence: b.confidence,
                class: b.label,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labelled_boxes() {
        let body = r#"{"detections":[
            {"x":0.1,"y":0.2,"w":0.3,"h":0.4,"confidence":0.91,"label":"person"},
            {"x":0.5,"y":0.5,"w":0.1,"h":0.1,"confidence":0.60,"label":"dog"}
        ]}"#;
        let result = parse_inference_response(body).expect("parse");
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[0].class, ObjectClass::Person);
        assert_eq!(result.detections[1].class, ObjectClass::Animal);
    }

    #[test]
    fn empty_body_object_means_no_detections() {
        let result = parse_inference_response("{}").expect("parse");
        assert!(result.is_empty());
    }

    #[test]
    fn endpoint_must_be_http() {
        assert!(HttpBackend::new("tcp://detector:9000").is_err());
    }
}
