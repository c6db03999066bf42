//! chaptercast: follow next-chapter links through a web novel, persist each
//! chapter as text, narrate it, and compile the audio into one audiobook.

pub mod audio;
pub mod cli;
pub mod config;
pub mod model;
pub mod naming;
pub mod notify;
pub mod publish;
pub mod scraper;
pub mod store;
pub mod text;
pub mod tts;

// Re-exports for CLI and consumers.
pub use audio::{AssemblyError, AssemblyResult, AudioAssembler};
pub use model::{AudioSegment, Chapter, TerminationReason};
pub use notify::{Notifier, NotifyError, RunStatus, WebhookNotifier};
pub use publish::{MirrorPublisher, PublishError, Publisher};
pub use scraper::{
    ChapterWalker, ExtractError, FetchError, PageFetcher, PoliteClient, PoliteClientBuilder,
    Selectors, WalkOutcome,
};
pub use store::{ChapterStore, StoreError};
pub use tts::{generate_segments, EspeakSynthesizer, Synthesizer, SynthesisError, VoiceConfig};
