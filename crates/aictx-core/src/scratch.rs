//! Output directory and the shared image scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, SetupError};

/// Name of the shared image directory inside the output directory
pub const IMAGE_DIR: &str = "images";

/// What [`ScratchDir::cleanup`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Empty directory removed
    Removed,
    /// Directory has content and was left in place
    Kept { entries: usize },
    /// Nothing to remove
    Absent,
}

/// Output directory plus its shared image directory
#[derive(Debug, Clone)]
pub struct ScratchDir {
    image_dir: PathBuf,
}

impl ScratchDir {
    /// Create `output_dir` and `output_dir/images` if missing.
    pub fn prepare(output_dir: impl Into<PathBuf>) -> Result<Self, SetupError> {
        let output_dir = output_dir.into();
        let image_dir = output_dir.join(IMAGE_DIR);
        for dir in [&output_dir, &image_dir] {
            fs::create_dir_all(dir).map_err(|source| SetupError::Directory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { image_dir })
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Remove the image directory if and only if it is empty.
    ///
    /// Must run after every worker has been joined. Safe to call repeatedly.
    pub fn cleanup(&self) -> Result<Cleanup, PipelineError> {
        let fail = |source: io::Error| PipelineError::Cleanup {
            path: self.image_dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.image_dir) {
            Ok(iter) => iter.count(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Cleanup::Absent),
            Err(e) => return Err(fail(e)),
        };
        if entries > 0 {
            log::debug!(
                "keeping {} ({entries} entries)",
                self.image_dir.display()
            );
            return Ok(Cleanup::Kept { entries });
        }

        match fs::remove_dir(&self.image_dir) {
            Ok(()) => {
                log::debug!("removed empty {}", self.image_dir.display());
                Ok(Cleanup::Removed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Cleanup::Absent),
            Err(e) => Err(fail(e)),
        }
    }
}
