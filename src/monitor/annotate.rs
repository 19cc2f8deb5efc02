use anyhow::{anyhow, Result};

use crate::detect::Detection;
use crate::ingest::{encode_jpeg, CapturedFrame};

const BOX_COLOR: [u8; 3] = [255, 0, 0];
const BOX_THICKNESS: u32 = 2;

/// Renders the frame in grayscale with the detection box drawn in colour
/// and returns it as JPEG.
pub fn highlight_detection(frame: &CapturedFrame, detection: &Detection) -> Result<Vec<u8>> {
    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 {
        return Err(anyhow!("cannot highlight an empty frame"));
    }
    let mut pixels = frame.pixels.clone();
    for px in pixels.chunks_exact_mut(3) {
        let luma =
            ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8;
        px.fill(luma);
    }

    let to_px = |v: f32, max: u32| ((v.clamp(0.0, 1.0) * max as f32) as u32).min(max - 1);
    let left = to_px(detection.x, width);
    let top = to_px(detection.y, height);
    let right = to_px(detection.x + detection.w, width);
    let bottom = to_px(detection.y + detection.h, height);

    for y in top..=bottom {
        for x in left..=right {
            let on_edge = x < left + BOX_THICKNESS
                || x + BOX_THICKNESS > right
                || y < top + BOX_THICKNESS
                || y + BOX_THICKNESS > bottom;
            if on_edge {
                let idx = ((y * width + x) * 3) as usize;
                pixels[idx..idx + 3].copy_from_slice(&BOX_COLOR);
            }
        }
    }

    encode_jpeg(&pixels, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ObjectClass;

    #[test]
    fn highlight_produces_jpeg_of_same_size() {
        let frame = CapturedFrame::from_rgb(vec![120u8; 20 * 10 * 3], 20, 10).expect("frame");
        let detection = Detection {
            x: 0.25,
            y: 0.2,
            w: 0.5,
            h: 0.6,
            confidence: 0.9,
            class: ObjectClass::Person,
        };
        let jpeg = highlight_detection(&frame, &detection).expect("highlight");
        let decoded = image::load_from_memory(&jpeg).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn box_is_drawn_in_red_on_gray() {
        let frame = CapturedFrame::from_rgb(vec![120u8; 64 * 48 * 3], 64, 48).expect("frame");
        let detection = Detection {
            x: 0.25,
            y: 0.25,
            w: 0.5,
            h: 0.5,
            confidence: 0.9,
            class: ObjectClass::Person,
        };
        let jpeg = highlight_detection(&frame, &detection).expect("highlight");
        let decoded = image::load_from_memory(&jpeg).expect("decode").to_rgb8();
        let edge = decoded.get_pixel(16, 24).0;
        assert!(edge[0] > edge[1] && edge[0] > edge[2], "edge pixel {:?}", edge);
        let inside = decoded.get_pixel(32, 24).0;
        assert!(inside[0].abs_diff(inside[1]) < 16, "inside pixel {:?}", inside);
    }
}
