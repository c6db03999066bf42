//! Optional config file loading. Search order: ./chaptercast.toml, then
//! $XDG_CONFIG_HOME/chaptercast/config.toml (or ~/.config/chaptercast/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override
/// defaults, and CLI flags override config.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Base output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between page requests.
    pub request_delay_secs: Option<u64>,
    /// Page request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// CSS selector for the chapter title element.
    pub title_selector: Option<String>,
    /// CSS selector for the chapter content container.
    pub content_selector: Option<String>,
    /// CSS selector for the next-chapter link.
    pub next_link_selector: Option<String>,
    /// Speech voice identity (e.g. "en-gb").
    pub voice: Option<String>,
    /// Speech rate in words per minute.
    pub rate_wpm: Option<u32>,
    /// Speech amplitude, 0-200.
    pub volume: Option<u32>,
    /// Maximum characters per synthesis chunk.
    pub max_chunk_chars: Option<usize>,
    /// Directory to mirror the output into after assembly.
    pub publish_dir: Option<PathBuf>,
    /// Webhook URL for the end-of-run notification.
    pub notify_url: Option<String>,
}

/// Search order: (1) ./chaptercast.toml, (2) $XDG_CONFIG_HOME/chaptercast/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("chaptercast.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("chaptercast").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}
