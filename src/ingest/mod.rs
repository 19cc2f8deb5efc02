//! Frame sources for the presence monitor.
//!
//! This module provides different sources for camera frames:
//! - Stub source (synthetic scenes, testing and demo)
//! - HTTP snapshot cameras (feature: ingest-http)
//!
//! Every source yields a `CapturedFrame` carrying both the decoded RGB
//! pixels handed to the detector and the JPEG bytes that get published.
//! Frames are scaled to the configured width before either is produced.

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::GenericImageView;

#[cfg(feature = "ingest-http")]
pub mod snapshot;
pub mod stub;

#[cfg(feature = "ingest-http")]
pub use snapshot::SnapshotSource;
pub use stub::StubSource;

const JPEG_QUALITY: u8 = 85;

/// A single camera frame.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    /// Packed RGB8 pixels, row major.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG encoding of the same image.
    pub jpeg: Vec<u8>,
}

impl CapturedFrame {
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let jpeg = encode_jpeg(&pixels, width, height)?;
        Ok(Self {
            pixels,
            width,
            height,
            jpeg,
        })
    }

    /// Decodes a JPEG and scales it to `target_width`, keeping aspect ratio.
    pub fn from_jpeg(bytes: &[u8], target_width: u32) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode jpeg")?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("decoded image has no pixels"));
        }
        if target_width == 0 || width == target_width {
            let rgb = image.into_rgb8();
            return Ok(Self {
                pixels: rgb.into_raw(),
                width,
                height,
                jpeg: bytes.to_vec(),
            });
        }
        let target_height = ((height as u64 * target_width as u64) / width as u64).max(1) as u32;
        let resized = image.resize_exact(target_width, target_height, FilterType::Triangle);
        let rgb = resized.into_rgb8();
        Self::from_rgb(rgb.into_raw(), target_width, target_height)
    }
}

/// Camera abstraction used by the presence monitor.
pub trait FrameSource: Send {
    /// Human readable description for logs.
    fn describe(&self) -> String;

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Capture and decode the next frame.
    fn next_frame(&mut self) -> Result<CapturedFrame>;

    /// Advance past a frame that will not be processed.
    fn skip_frame(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        (**self).next_frame()
    }

    fn skip_frame(&mut self) -> Result<()> {
        (**self).skip_frame()
    }
}

/// Builds the source named by a camera URL (`stub://...` or `http(s)://...`).
pub fn open_source(url: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
    if url.starts_with("stub://") {
        return Ok(Box::new(StubSource::new(width, height)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        #[cfg(feature = "ingest-http")]
        {
            return Ok(Box::new(SnapshotSource::new(url, width)?));
        }
        #[cfg(not(feature = "ingest-http"))]
        {
            return Err(anyhow!(
                "http camera sources require the ingest-http feature"
            ));
        }
    }
    Err(anyhow!(
        "unsupported camera source '{}'; expected stub:// or http(s)://",
        url
    ))
}

pub(crate) fn encode_jpeg(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(pixels, width, height, image::ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_rejects_wrong_length() {
        let err = CapturedFrame::from_rgb(vec![0u8; 10], 4, 4).unwrap_err();
        assert!(format!("{err}").contains("RGB bytes"));
    }

    #[test]
    fn jpeg_roundtrip_scales_to_target_width() {
        let frame = CapturedFrame::from_rgb(vec![128u8; 80 * 40 * 3], 80, 40).expect("frame");
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);

        let scaled = CapturedFrame::from_jpeg(&frame.jpeg, 40).expect("decode");
        assert_eq!((scaled.width, scaled.height), (40, 20));
        assert_eq!(scaled.pixels.len(), 40 * 20 * 3);
    }

    #[test]
    fn open_source_rejects_unknown_scheme() {
        assert!(open_source("rtsp://camera", 10, 10).is_err());
        assert!(open_source("stub://camera", 10, 10).is_ok());
    }
}
