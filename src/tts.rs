//! Speech synthesis: one audio segment per persisted chapter.
//!
//! The [Synthesizer] trait is the collaborator boundary; the bundled
//! implementation shells out to espeak-ng (or espeak) and encodes the result
//! to MP3 with ffmpeg. A chapter whose synthesis fails is logged and skipped;
//! the run continues with the remaining chapters.

use crate::model::{AudioSegment, Chapter};
use crate::naming;
use crate::store::StoreError;
use crate::text::{chunk_text, DEFAULT_MAX_CHUNK_CHARS};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Voice parameters for speech synthesis.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Voice identity (espeak voice name, e.g. "en-gb").
    pub voice: String,
    /// Speech rate in words per minute.
    pub rate_wpm: u32,
    /// Amplitude, 0-200.
    pub volume: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: "en-gb".to_string(),
            rate_wpm: 170,
            volume: 100,
        }
    }
}

/// One chapter's audio failed to generate.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("No speech engine found. Install espeak-ng or espeak.")]
    NoEngine,

    #[error("Chapter text is empty")]
    EmptyText,

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed: {detail}")]
    EngineFailed { program: String, detail: String },

    #[error("Audio I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capability to turn one chapter's text into one audio file.
///
/// Implementations own any internal chunking; the contract is full text in,
/// a single finished segment file at `output` out.
pub trait Synthesizer {
    fn synthesize(&mut self, text: &str, output: &Path) -> Result<(), SynthesisError>;
}

/// espeak-ng/espeak-based synthesizer.
///
/// Long text is chunked on sentence boundaries to stay under the engine's
/// practical input limit; chunk WAVs are merged and encoded into one MP3 per
/// chapter via ffmpeg. Scratch files live in a temp dir and are cleaned up
/// when it drops.
#[derive(Debug)]
pub struct EspeakSynthesizer {
    voice: VoiceConfig,
    max_chunk_chars: usize,
    ffmpeg: String,
    engine: Option<String>,
}

impl EspeakSynthesizer {
    pub fn new(voice: VoiceConfig) -> Self {
        Self {
            voice,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            ffmpeg: "ffmpeg".to_string(),
            engine: None,
        }
    }

    /// Override the per-chunk character limit.
    pub fn max_chunk_chars(mut self, max: usize) -> Self {
        self.max_chunk_chars = max.max(1);
        self
    }

    /// Detect an available engine once and cache the choice.
    fn detect_engine(&mut self) -> Result<String, SynthesisError> {
        if let Some(ref engine) = self.engine {
            return Ok(engine.clone());
        }
        for candidate in ["espeak-ng", "espeak"] {
            let found = Command::new("which")
                .arg(candidate)
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false);
            if found {
                self.engine = Some(candidate.to_string());
                return Ok(candidate.to_string());
            }
        }
        Err(SynthesisError::NoEngine)
    }

    fn synthesize_chunk(
        &self,
        engine: &str,
        chunk: &str,
        wav: &Path,
    ) -> Result<(), SynthesisError> {
        let output = Command::new(engine)
            .arg("-v")
            .arg(&self.voice.voice)
            .arg("-s")
            .arg(self.voice.rate_wpm.to_string())
            .arg("-a")
            .arg(self.voice.volume.to_string())
            .arg("-w")
            .arg(wav)
            .arg(chunk)
            .output()
            .map_err(|e| SynthesisError::Spawn {
                program: engine.to_string(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(SynthesisError::EngineFailed {
                program: engine.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Encode chunk WAVs into the final MP3: a lone chunk is transcoded
    /// directly, multiple chunks go through the concat demuxer.
    fn encode_mp3(
        &self,
        parts: &[PathBuf],
        output: &Path,
        scratch: &Path,
    ) -> Result<(), SynthesisError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y");
        if parts.len() == 1 {
            cmd.arg("-i").arg(&parts[0]);
        } else {
            let list_path = scratch.join("parts.txt");
            let mut list = String::new();
            for part in parts {
                let escaped = part.display().to_string().replace('\'', r"'\''");
                list.push_str(&format!("file '{}'\n", escaped));
            }
            std::fs::write(&list_path, list).map_err(|e| SynthesisError::Io {
                path: list_path.clone(),
                source: e,
            })?;
            cmd.arg("-f").arg("concat").arg("-safe").arg("0");
            cmd.arg("-i").arg(&list_path);
        }
        cmd.arg("-c:a").arg("libmp3lame").arg("-q:a").arg("4");
        cmd.arg(output);

        let out = cmd.output().map_err(|e| SynthesisError::Spawn {
            program: self.ffmpeg.clone(),
            source: e,
        })?;
        if !out.status.success() {
            return Err(SynthesisError::EngineFailed {
                program: self.ffmpeg.clone(),
                detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        if !output.is_file() {
            return Err(SynthesisError::EngineFailed {
                program: self.ffmpeg.clone(),
                detail: format!("no output produced at {}", output.display()),
            });
        }
        Ok(())
    }
}

impl Synthesizer for EspeakSynthesizer {
    fn synthesize(&mut self, text: &str, output: &Path) -> Result<(), SynthesisError> {
        let chunks = chunk_text(text, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let engine = self.detect_engine()?;
        let scratch = tempfile::Builder::new()
            .prefix("chaptercast-tts-")
            .tempdir()
            .map_err(|e| SynthesisError::Io {
                path: output.to_path_buf(),
                source: e,
            })?;
        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let wav = scratch.path().join(format!("part_{:03}.wav", i));
            self.synthesize_chunk(&engine, chunk, &wav)?;
            parts.push(wav);
        }
        self.encode_mp3(&parts, output, scratch.path())
    }
}

/// Synthesize one segment per chapter, reading the persisted text file (so
/// the narration includes the title header the store wrote).
///
/// Per-chapter failures are logged and skipped; the returned list is in
/// chapter-number order and may be sparse. Only audio-directory creation
/// failure is fatal.
pub fn generate_segments<S: Synthesizer + ?Sized>(
    chapters: &[Chapter],
    audio_dir: &Path,
    synthesizer: &mut S,
) -> Result<Vec<AudioSegment>, StoreError> {
    std::fs::create_dir_all(audio_dir).map_err(|e| StoreError::CreateDir {
        path: audio_dir.to_path_buf(),
        source: e,
    })?;

    let mut segments = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let text = match std::fs::read_to_string(&chapter.storage_path) {
            Ok(text) => text,
            Err(e) => {
                log::error!(
                    "Chapter {}: cannot read {}: {}. Skipped.",
                    chapter.number,
                    chapter.storage_path.display(),
                    e
                );
                continue;
            }
        };
        let path = audio_dir.join(format!(
            "{}.mp3",
            naming::chapter_stem(chapter.number, &chapter.title)
        ));
        log::info!("Synthesizing chapter {}: {}", chapter.number, chapter.title);
        match synthesizer.synthesize(&text, &path) {
            Ok(()) => segments.push(AudioSegment {
                number: chapter.number,
                path,
            }),
            Err(e) => {
                log::error!(
                    "Chapter {} failed synthesis: {}. Skipped.",
                    chapter.number,
                    e
                );
                if path.exists() {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
    }
    log::info!(
        "Synthesized audio for {}/{} chapter(s).",
        segments.len(),
        chapters.len()
    );
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChapterStore;
    use std::collections::HashSet;

    /// Writes a small fake MP3 payload; fails for configured chapter texts.
    struct FakeSynthesizer {
        fail_containing: HashSet<String>,
        calls: usize,
    }

    impl FakeSynthesizer {
        fn new() -> Self {
            Self {
                fail_containing: HashSet::new(),
                calls: 0,
            }
        }
    }

    impl Synthesizer for FakeSynthesizer {
        fn synthesize(&mut self, text: &str, output: &Path) -> Result<(), SynthesisError> {
            self.calls += 1;
            for marker in &self.fail_containing {
                if text.contains(marker.as_str()) {
                    // Simulate a partial write before the failure.
                    std::fs::write(output, b"partial").unwrap();
                    return Err(SynthesisError::EngineFailed {
                        program: "fake".to_string(),
                        detail: "forced failure".to_string(),
                    });
                }
            }
            std::fs::write(output, b"ID3 fake audio").unwrap();
            Ok(())
        }
    }

    fn persisted_chapters(store: &ChapterStore, n: u32) -> Vec<Chapter> {
        (1..=n)
            .map(|i| {
                store
                    .persist(i, &format!("Chapter {}", i), &format!("Body {}.", i))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn generates_one_segment_per_chapter_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let chapters = persisted_chapters(&store, 3);
        let audio_dir = dir.path().join("audio");
        let mut synth = FakeSynthesizer::new();
        let segments = generate_segments(&chapters, &audio_dir, &mut synth).unwrap();
        assert_eq!(segments.len(), 3);
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.number, i as u32 + 1);
            assert!(seg.path.exists());
            assert!(seg.path.starts_with(&audio_dir));
        }
    }

    #[test]
    fn failed_chapter_is_skipped_and_partial_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let chapters = persisted_chapters(&store, 3);
        let audio_dir = dir.path().join("audio");
        let mut synth = FakeSynthesizer::new();
        synth.fail_containing.insert("Body 2.".to_string());
        let segments = generate_segments(&chapters, &audio_dir, &mut synth).unwrap();
        let numbers: Vec<u32> = segments.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        // The partial output of the failed chapter must not linger.
        let mp3s: Vec<_> = std::fs::read_dir(&audio_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(mp3s.len(), 2);
        assert!(!mp3s.iter().any(|n| n.starts_with("002_")));
    }

    #[test]
    fn all_chapters_failing_yields_empty_list_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let chapters = persisted_chapters(&store, 2);
        let mut synth = FakeSynthesizer::new();
        synth.fail_containing.insert("Body".to_string());
        let segments =
            generate_segments(&chapters, &dir.path().join("audio"), &mut synth).unwrap();
        assert!(segments.is_empty());
        assert_eq!(synth.calls, 2);
    }

    #[test]
    fn narration_input_includes_title_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let chapter = store.persist(1, "Spoken Title", "Spoken body.").unwrap();

        struct Capture(String);
        impl Synthesizer for Capture {
            fn synthesize(&mut self, text: &str, output: &Path) -> Result<(), SynthesisError> {
                self.0 = text.to_string();
                std::fs::write(output, b"x").unwrap();
                Ok(())
            }
        }
        let mut capture = Capture(String::new());
        generate_segments(&[chapter], &dir.path().join("audio"), &mut capture).unwrap();
        assert!(capture.0.starts_with("Spoken Title\n\n"));
        assert!(capture.0.contains("Spoken body."));
    }

    #[test]
    fn segment_names_match_chapter_stems() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let chapter = store.persist(4, "A Title", "Text.").unwrap();
        let mut synth = FakeSynthesizer::new();
        let segments =
            generate_segments(&[chapter], &dir.path().join("audio"), &mut synth).unwrap();
        assert_eq!(
            segments[0].path.file_name().unwrap().to_str().unwrap(),
            "004_A_Title.mp3"
        );
    }

    #[test]
    fn espeak_synthesizer_rejects_empty_text() {
        let mut synth = EspeakSynthesizer::new(VoiceConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = synth
            .synthesize("   ", &dir.path().join("out.mp3"))
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyText));
    }
}
