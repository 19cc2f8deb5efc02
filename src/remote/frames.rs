use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::store::FrameRecord;

/// Local directory of frames saved for triggered alarms, one JPEG per
/// alarm named after the frame's capture timestamp.
#[derive(Clone, Debug)]
pub struct FrameArchive {
    dir: PathBuf,
}

impl FrameArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, timestamp: &str) -> Result<PathBuf> {
        let name = sanitize_timestamp(timestamp)?;
        Ok(self.dir.join(format!("{}.jpg", name)))
    }

    /// Decodes the record and writes it, replacing any file of the same name.
    pub fn persist(&self, record: &FrameRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.timestamp)?;
        let image = record.decode_image()?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create frames dir {}", self.dir.display()))?;
        write_atomic(&path, &image).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Maps a timestamp onto `[A-Za-z0-9_-]`, replacing anything else with `_`.
fn sanitize_timestamp(timestamp: &str) -> Result<String> {
    let trimmed = timestamp.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("frame timestamp cannot be empty"));
    }
    Ok(trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("jpg.tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
