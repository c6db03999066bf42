//! Best-effort publication of a run's output directory.
//!
//! The [Publisher] capability mirrors the per-title output area to a remote
//! location, preserving relative structure. Failures are logged by the caller
//! and never abort the run.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Output directory not found: {path}")]
    MissingSource { path: PathBuf },

    #[error("Failed to mirror {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capability to make every file under a local directory available remotely.
/// Returns an identifier for the remote location.
pub trait Publisher {
    fn publish(&self, dir: &Path) -> Result<String, PublishError>;
}

/// Publishes by copying the output tree into a target directory, typically a
/// mounted sync folder that a drive client uploads from.
#[derive(Debug)]
pub struct MirrorPublisher {
    target: PathBuf,
}

impl MirrorPublisher {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Publisher for MirrorPublisher {
    fn publish(&self, dir: &Path) -> Result<String, PublishError> {
        if !dir.is_dir() {
            return Err(PublishError::MissingSource {
                path: dir.to_path_buf(),
            });
        }
        let dest = match dir.file_name() {
            Some(name) => self.target.join(name),
            None => self.target.clone(),
        };
        copy_tree(dir, &dest)?;
        log::info!("Mirrored {} to {}", dir.display(), dest.display());
        Ok(dest.display().to_string())
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), PublishError> {
    let io_err = |path: &Path, source: std::io::Error| PublishError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    for entry in std::fs::read_dir(src).map_err(|e| io_err(src, e))? {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| io_err(&from, e))?;
        }
    }
    Ok(())
}
