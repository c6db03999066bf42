//! Audio assembly: merge ordered segments into one audiobook file, with an
//! archive fallback.
//!
//! The primary path concatenates the segments (audio only, given order) into
//! an M4B container via ffmpeg. Any merge failure is caught here and recovered
//! by zipping the original segment files instead; the caller only learns which
//! variant was produced. Already-synthesized audio is never lost.

use crate::model::AudioSegment;
use crate::naming;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// The single artifact an assembly run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyResult {
    /// Merged audiobook container.
    Merged(PathBuf),
    /// Compressed bundle of the original segment files (degraded output).
    Archived(PathBuf),
}

impl AssemblyResult {
    pub fn path(&self) -> &Path {
        match self {
            AssemblyResult::Merged(p) | AssemblyResult::Archived(p) => p,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, AssemblyResult::Merged(_))
    }

    /// Short label for reports ("merged audiobook" / "segment archive").
    pub fn describe(&self) -> &'static str {
        match self {
            AssemblyResult::Merged(_) => "merged audiobook",
            AssemblyResult::Archived(_) => "segment archive",
        }
    }
}

/// Errors the assembler cannot recover from. Merge failures are not among
/// them; those fall back to the archive.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No audio segments to assemble.")]
    NoSegments,

    #[error("Failed to create archive {path}: {source}")]
    ArchiveCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {path}: {source}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read segment {path}: {source}")]
    SegmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why the primary merge path failed; internal, always recovered.
#[derive(Debug, Error)]
enum MergeFailure {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} reported success but produced no file at {path}")]
    MissingOutput { program: String, path: PathBuf },
}

/// Combines ordered audio segments into one deliverable artifact.
///
/// At most one assembly per title may run at a time; both output paths are
/// deterministic functions of the title, and re-running with the same inputs
/// overwrites rather than accumulates.
#[derive(Debug)]
pub struct AudioAssembler {
    out_dir: PathBuf,
    ffmpeg: String,
}

impl AudioAssembler {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    /// Override the ffmpeg program name (used by tests to force either path).
    pub fn ffmpeg_program(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// Assemble `segments` (already in chapter-number order) into exactly one
    /// artifact for `title`.
    ///
    /// On merge failure the partial merge output is deleted and the archive is
    /// produced instead; on merge success a stale archive from an earlier
    /// degraded run is deleted. Exactly one of the two files exists afterwards.
    pub fn assemble(
        &self,
        segments: &[AudioSegment],
        title: &str,
    ) -> Result<AssemblyResult, AssemblyError> {
        if segments.is_empty() {
            return Err(AssemblyError::NoSegments);
        }
        let merged_path = self.out_dir.join(naming::artifact_name(title, "m4b"));
        let archive_path = self.out_dir.join(naming::artifact_name(title, "zip"));

        match self.merge(segments, &merged_path) {
            Ok(()) => {
                if archive_path.exists() {
                    let _ = std::fs::remove_file(&archive_path);
                }
                log::info!("Created audiobook: {}", merged_path.display());
                Ok(AssemblyResult::Merged(merged_path))
            }
            Err(e) => {
                log::error!("Audiobook merge failed: {}", e);
                log::info!("Falling back to an archive of the segment files.");
                if merged_path.exists() {
                    let _ = std::fs::remove_file(&merged_path);
                }
                self.archive(segments, &archive_path)?;
                log::info!("Created archive: {}", archive_path.display());
                Ok(AssemblyResult::Archived(archive_path))
            }
        }
    }

    /// Concatenate the segments' audio streams into one M4B.
    fn merge(&self, segments: &[AudioSegment], output: &Path) -> Result<(), MergeFailure> {
        let joined = segments
            .iter()
            .map(|s| s.path.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("|");
        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(format!("concat:{}", joined))
            .arg("-vn")
            .arg("-c:a")
            .arg("aac")
            .arg("-b:a")
            .arg("128k")
            .arg("-movflags")
            .arg("+faststart")
            .arg("-f")
            .arg("ipod")
            .arg(output)
            .output()
            .map_err(|e| MergeFailure::Spawn {
                program: self.ffmpeg.clone(),
                source: e,
            })?;
        if !result.status.success() {
            return Err(MergeFailure::Exit {
                program: self.ffmpeg.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.is_file() {
            return Err(MergeFailure::MissingOutput {
                program: self.ffmpeg.clone(),
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Bundle the original segment files, uncompressed (MP3 is already
    /// compressed), under their original names.
    fn archive(&self, segments: &[AudioSegment], output: &Path) -> Result<(), AssemblyError> {
        let file = File::create(output).map_err(|e| AssemblyError::ArchiveCreate {
            path: output.to_path_buf(),
            source: e,
        })?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        for segment in segments {
            let name = segment
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("segment_{:03}.mp3", segment.number));
            zip.start_file(name, options)
                .map_err(|e| AssemblyError::ArchiveWrite {
                    path: output.to_path_buf(),
                    source: e,
                })?;
            let mut src = File::open(&segment.path).map_err(|e| AssemblyError::SegmentRead {
                path: segment.path.clone(),
                source: e,
            })?;
            std::io::copy(&mut src, &mut zip).map_err(|e| AssemblyError::ArchiveWrite {
                path: output.to_path_buf(),
                source: zip::result::ZipError::Io(e),
            })?;
        }
        zip.finish().map_err(|e| AssemblyError::ArchiveWrite {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}
