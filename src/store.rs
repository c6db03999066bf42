//! Durable chapter text storage.
//!
//! One text file per chapter under the per-title output directory, named by
//! the shared naming utility so lexicographic order equals chapter order.

use crate::model::Chapter;
use crate::naming;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from persisting chapters or preparing output directories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write chapter file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes chapter text files into one per-title directory.
#[derive(Debug)]
pub struct ChapterStore {
    dir: PathBuf,
}

impl ChapterStore {
    /// Create the output directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// The per-title output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one chapter and return it with `storage_path` assigned.
    ///
    /// The file holds the title, a blank line, then the body, so the text is
    /// readable on its own and the synthesis stage narrates the title first.
    pub fn persist(&self, number: u32, title: &str, body: &str) -> Result<Chapter, StoreError> {
        let path = self
            .dir
            .join(format!("{}.txt", naming::chapter_stem(number, title)));
        let contents = format!("{}\n\n{}\n", title, body);
        std::fs::write(&path, contents).map_err(|e| StoreError::Write {
            path: path.clone(),
            source: e,
        })?;
        Ok(Chapter {
            number,
            title: title.to_string(),
            body_text: body.to_string(),
            storage_path: path,
        })
    }
}
