//! CLI parsing and orchestration. Parses args, runs scrape -> synthesis ->
//! assembly -> publish -> notify, and maps errors to exit codes.

use crate::audio::{AssemblyError, AssemblyResult, AudioAssembler};
use crate::config;
use crate::model::TerminationReason;
use crate::naming;
use crate::notify::{Notifier, RunStatus, WebhookNotifier};
use crate::publish::{MirrorPublisher, Publisher};
use crate::scraper::{ChapterWalker, PageFetcher, PoliteClient, Selectors};
use crate::store::{ChapterStore, StoreError};
use crate::tts::{generate_segments, EspeakSynthesizer, Synthesizer, VoiceConfig};
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Assembly(#[from] AssemblyError),

    #[error("{0}")]
    Pipeline(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Store(_) => 2,
            CliRunError::Assembly(_) | CliRunError::Pipeline(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "chaptercast")]
#[command(about = "Scrape sequential web novel chapters and compile them into an audiobook")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, request_delay_secs, timeout_secs, \
title_selector, content_selector, next_link_selector, voice, rate_wpm, volume, max_chunk_chars, \
publish_dir, notify_url) are documented in the README. CLI flags override config."
)]
pub struct Args {
    /// URL of the first chapter to scrape.
    pub url: String,

    /// Maximum number of chapters to scrape.
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Novel title. Names the output directory and the final artifact.
    #[arg(short, long)]
    pub title: String,

    /// Base output directory. The run writes into <output>/<sanitized-title>/.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// CSS selector for the chapter title element (default: h1).
    #[arg(long)]
    pub title_selector: Option<String>,

    /// CSS selector for the chapter content container (default: div.chapter-content).
    #[arg(long)]
    pub content_selector: Option<String>,

    /// CSS selector for the next-chapter link (default: a.next).
    #[arg(long)]
    pub next_selector: Option<String>,

    /// Voice identity for speech synthesis (e.g. en-gb).
    #[arg(long)]
    pub voice: Option<String>,

    /// Speech rate in words per minute.
    #[arg(long)]
    pub rate_wpm: Option<u32>,

    /// Speech amplitude, 0-200.
    #[arg(long)]
    pub volume: Option<u32>,

    /// Delay between page requests in seconds (overrides config; default 1).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Page request timeout in seconds (overrides config; default 10).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Scrape and persist chapter text only; skip synthesis and assembly.
    #[arg(long)]
    pub text_only: bool,

    /// Mirror the run's output directory into this directory afterwards.
    #[arg(long)]
    pub publish_dir: Option<PathBuf>,

    /// POST the final status and detail to this webhook URL when the run ends.
    #[arg(long)]
    pub notify_url: Option<String>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// What one run accomplished, for the summary line and the notification.
#[derive(Debug)]
struct RunReport {
    requested: u32,
    scraped: usize,
    termination: TerminationReason,
    synthesized: usize,
    artifact: Option<AssemblyResult>,
    published: Option<String>,
}

impl RunReport {
    fn summary(&self) -> String {
        let mut s = format!(
            "Scraped {} of {} chapter(s) ({})",
            self.scraped,
            self.requested,
            self.termination.describe()
        );
        match &self.artifact {
            Some(artifact) => {
                s.push_str(&format!(
                    "; synthesized {} segment(s); {} at {}",
                    self.synthesized,
                    artifact.describe(),
                    artifact.path().display()
                ));
            }
            None => s.push_str("; text only, no audio produced"),
        }
        if let Some(ref remote) = self.published {
            s.push_str(&format!("; published to {}", remote));
        }
        s.push('.');
        s
    }
}

/// One run's merged inputs: what to scrape and what to produce.
struct RunRequest<'a> {
    url: &'a str,
    count: u32,
    title: &'a str,
    text_only: bool,
}

/// Scrape -> synthesize -> assemble. Collaborators are passed in so the whole
/// pipeline runs under test with substitutes.
fn run_pipeline<F: PageFetcher, S: Synthesizer>(
    fetcher: &mut F,
    synthesizer: &mut S,
    assembler: &AudioAssembler,
    store: &ChapterStore,
    selectors: &Selectors,
    request: &RunRequest<'_>,
    progress: Option<&dyn Fn(u32, u32)>,
) -> Result<RunReport, CliRunError> {
    let mut walker = ChapterWalker::new(fetcher, selectors, store)
        .map_err(|e| CliRunError::InvalidInput(format!("Selector configuration error: {}", e)))?;
    if let Some(p) = progress {
        walker = walker.with_progress(p);
    }
    let outcome = walker.walk(request.url, request.count)?;

    if outcome.chapters.is_empty() {
        return Err(CliRunError::Pipeline(format!(
            "No chapters scraped from {} ({}).",
            request.url,
            outcome.termination.describe()
        )));
    }
    let mut report = RunReport {
        requested: request.count,
        scraped: outcome.chapters.len(),
        termination: outcome.termination,
        synthesized: 0,
        artifact: None,
        published: None,
    };
    if request.text_only {
        return Ok(report);
    }

    let audio_dir = store.dir().join("audio");
    let segments = generate_segments(&outcome.chapters, &audio_dir, synthesizer)?;
    if segments.is_empty() {
        return Err(CliRunError::Pipeline(format!(
            "All {} scraped chapter(s) failed speech synthesis.",
            report.scraped
        )));
    }
    report.synthesized = segments.len();

    report.artifact = Some(assembler.assemble(&segments, request.title)?);
    Ok(report)
}

fn notify_outcome(notifier: &Option<WebhookNotifier>, status: RunStatus, detail: &str) {
    if let Some(n) = notifier {
        if let Err(e) = n.notify(status, detail) {
            log::error!("Notification failed (ignored): {}", e);
        }
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and
/// message on failure. The notifier fires on both outcomes.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    const DEFAULT_DELAY_SECS: u64 = 1;
    const DEFAULT_TIMEOUT_SECS: u64 = 10;
    let delay_secs = args
        .delay
        .or_else(|| config.as_ref().and_then(|c| c.request_delay_secs))
        .unwrap_or(DEFAULT_DELAY_SECS);
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));

    let mut builder = PoliteClient::builder()
        .delay_secs(delay_secs)
        .timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let selector_defaults = Selectors::default();
    let selectors = Selectors {
        title: args
            .title_selector
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.title_selector.clone()))
            .unwrap_or(selector_defaults.title),
        content: args
            .content_selector
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.content_selector.clone()))
            .unwrap_or(selector_defaults.content),
        next_link: args
            .next_selector
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.next_link_selector.clone()))
            .unwrap_or(selector_defaults.next_link),
    };

    let voice_defaults = VoiceConfig::default();
    let voice = VoiceConfig {
        voice: args
            .voice
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.voice.clone()))
            .unwrap_or(voice_defaults.voice),
        rate_wpm: args
            .rate_wpm
            .or_else(|| config.as_ref().and_then(|c| c.rate_wpm))
            .unwrap_or(voice_defaults.rate_wpm),
        volume: args
            .volume
            .or_else(|| config.as_ref().and_then(|c| c.volume))
            .unwrap_or(voice_defaults.volume),
    };
    let mut synthesizer = EspeakSynthesizer::new(voice);
    if let Some(max) = config.as_ref().and_then(|c| c.max_chunk_chars) {
        synthesizer = synthesizer.max_chunk_chars(max);
    }

    let output_base: PathBuf = args
        .output
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("output"));
    let store = ChapterStore::create(output_base.join(naming::title_dir(&args.title)))?;
    let assembler = AudioAssembler::new(store.dir());

    let notify_url = args
        .notify_url
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.notify_url.clone()));
    let notifier = match notify_url {
        Some(url) => match WebhookNotifier::new(url) {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("Notification disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Fetching chapter {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let request = RunRequest {
        url: &args.url,
        count: args.count,
        title: &args.title,
        text_only: args.text_only,
    };
    let result = run_pipeline(
        &mut client,
        &mut synthesizer,
        &assembler,
        &store,
        &selectors,
        &request,
        progress,
    );

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    let mut report = match result {
        Ok(report) => report,
        Err(e) => {
            notify_outcome(&notifier, RunStatus::Failure, &e.to_string());
            return Err(e);
        }
    };

    let publish_target = args
        .publish_dir
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.publish_dir.clone()));
    if let Some(target) = publish_target {
        let publisher = MirrorPublisher::new(target);
        match publisher.publish(store.dir()) {
            Ok(remote) => report.published = Some(remote),
            Err(e) => log::error!("Publish failed (continuing): {}", e),
        }
    }

    let summary = report.summary();
    notify_outcome(&notifier, RunStatus::Success, &summary);
    if !args.quiet {
        eprintln!("{}", summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::FetchError;
    use std::collections::HashMap;
    use std::path::Path;

    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    fn chain(n: usize) -> FakeFetcher {
        let mut pages = HashMap::new();
        for i in 1..=n {
            let next = if i < n {
                format!(
                    r#"<a class="next" href="https://example.com/ch/{}">next</a>"#,
                    i + 1
                )
            } else {
                String::new()
            };
            pages.insert(
                format!("https://example.com/ch/{}", i),
                format!(
                    r#"<h1>Chapter {}</h1><div class="chapter-content">Body {}.</div>{}"#,
                    i, i, next
                ),
            );
        }
        FakeFetcher { pages }
    }

    struct FakeSynthesizer {
        fail_all: bool,
    }

    impl Synthesizer for FakeSynthesizer {
        fn synthesize(
            &mut self,
            _text: &str,
            output: &Path,
        ) -> Result<(), crate::tts::SynthesisError> {
            if self.fail_all {
                return Err(crate::tts::SynthesisError::EngineFailed {
                    program: "fake".to_string(),
                    detail: "forced".to_string(),
                });
            }
            std::fs::write(output, b"audio").unwrap();
            Ok(())
        }
    }

    #[cfg(unix)]
    fn stub_ffmpeg(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, "#!/bin/sh\nfor a; do last=$a; done\n: > \"$last\"\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn end_to_end_short_chain_yields_merged_audiobook() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path().join("My_Novel")).unwrap();
        let assembler = AudioAssembler::new(store.dir()).ffmpeg_program(stub_ffmpeg(dir.path()));
        let mut fetcher = chain(3);
        let mut synth = FakeSynthesizer { fail_all: false };

        let report = run_pipeline(
            &mut fetcher,
            &mut synth,
            &assembler,
            &store,
            &Selectors::default(),
            &RunRequest {
                url: "https://example.com/ch/1",
                count: 5,
                title: "My Novel",
                text_only: false,
            },
            None,
        )
        .unwrap();

        assert_eq!(report.scraped, 3);
        assert_eq!(report.termination, TerminationReason::NoNextLink);
        assert_eq!(report.synthesized, 3);
        let artifact = report.artifact.as_ref().unwrap();
        assert!(artifact.is_merged());
        assert!(artifact.path().exists());
        assert_eq!(
            artifact.path().file_name().unwrap().to_str().unwrap(),
            "My_Novel.m4b"
        );
        // Three text files and three segments persisted.
        let texts = std::fs::read_dir(store.dir())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".txt")
            })
            .count();
        assert_eq!(texts, 3);
        let audio = std::fs::read_dir(store.dir().join("audio")).unwrap().count();
        assert_eq!(audio, 3);
    }

    #[test]
    fn pipeline_fails_when_nothing_scraped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let assembler = AudioAssembler::new(store.dir());
        let mut fetcher = FakeFetcher {
            pages: HashMap::new(),
        };
        let mut synth = FakeSynthesizer { fail_all: false };
        let err = run_pipeline(
            &mut fetcher,
            &mut synth,
            &assembler,
            &store,
            &Selectors::default(),
            &RunRequest {
                url: "https://example.com/missing",
                count: 3,
                title: "T",
                text_only: false,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CliRunError::Pipeline(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn text_only_skips_synthesis_and_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let assembler = AudioAssembler::new(store.dir());
        let mut fetcher = chain(2);
        let mut synth = FakeSynthesizer { fail_all: true };
        let report = run_pipeline(
            &mut fetcher,
            &mut synth,
            &assembler,
            &store,
            &Selectors::default(),
            &RunRequest {
                url: "https://example.com/ch/1",
                count: 2,
                title: "T",
                text_only: true,
            },
            None,
        )
        .unwrap();
        assert_eq!(report.scraped, 2);
        assert!(report.artifact.is_none());
        assert!(!store.dir().join("audio").exists());
    }

    #[test]
    fn all_synthesis_failures_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::create(dir.path()).unwrap();
        let assembler = AudioAssembler::new(store.dir());
        let mut fetcher = chain(2);
        let mut synth = FakeSynthesizer { fail_all: true };
        let err = run_pipeline(
            &mut fetcher,
            &mut synth,
            &assembler,
            &store,
            &Selectors::default(),
            &RunRequest {
                url: "https://example.com/ch/1",
                count: 2,
                title: "T",
                text_only: false,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CliRunError::Pipeline(_)));
    }

    #[test]
    fn partial_scrape_with_audio_is_reported_as_success_detail() {
        let report = RunReport {
            requested: 10,
            scraped: 8,
            termination: TerminationReason::NoNextLink,
            synthesized: 8,
            artifact: Some(AssemblyResult::Merged(PathBuf::from("out/My_Novel.m4b"))),
            published: None,
        };
        let summary = report.summary();
        assert!(summary.contains("Scraped 8 of 10 chapter(s)"));
        assert!(summary.contains("reached the end of the chapter chain"));
        assert!(summary.contains("merged audiobook at out/My_Novel.m4b"));
    }

    #[test]
    fn degraded_run_summary_names_the_archive() {
        let report = RunReport {
            requested: 3,
            scraped: 3,
            termination: TerminationReason::ExhaustedBudget,
            synthesized: 2,
            artifact: Some(AssemblyResult::Archived(PathBuf::from("out/T.zip"))),
            published: Some("/mnt/drive/T".to_string()),
        };
        let summary = report.summary();
        assert!(summary.contains("synthesized 2 segment(s)"));
        assert!(summary.contains("segment archive at out/T.zip"));
        assert!(summary.contains("published to /mnt/drive/T"));
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Store(StoreError::CreateDir {
                path: PathBuf::from("/x"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "denied"),
            })
            .exit_code(),
            2
        );
        assert_eq!(CliRunError::Assembly(AssemblyError::NoSegments).exit_code(), 3);
        assert_eq!(CliRunError::Pipeline("x".into()).exit_code(), 3);
    }

    #[test]
    fn args_parse_minimal_invocation() {
        let args = Args::try_parse_from([
            "chaptercast",
            "https://example.com/ch/1",
            "--count",
            "10",
            "--title",
            "My Novel",
        ])
        .unwrap();
        assert_eq!(args.url, "https://example.com/ch/1");
        assert_eq!(args.count, 10);
        assert_eq!(args.title, "My Novel");
        assert!(!args.text_only);
        assert!(args.output.is_none());
    }

    #[test]
    fn args_reject_zero_count() {
        let result = Args::try_parse_from([
            "chaptercast",
            "https://example.com/ch/1",
            "--count",
            "0",
            "--title",
            "T",
        ]);
        assert!(result.is_err());
    }
}
