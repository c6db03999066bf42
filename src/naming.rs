//! Deterministic file naming for chapters and run outputs.
//!
//! Every on-disk name in a run (chapter text, audio segment, final artifact,
//! per-title directory) is derived here, so the stored filename and the
//! displayed title can never diverge.

/// Maximum length, in characters, of a sanitized name component.
const MAX_COMPONENT_CHARS: usize = 100;

/// Turn an arbitrary title into a filesystem-safe name component.
///
/// Drops path separators and characters illegal on common filesystems,
/// collapses whitespace runs to a single `_`, and caps the length.
/// Idempotent: sanitizing an already-sanitized name returns it unchanged.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        match c {
            '/' | '\\' | ':' | '"' | '*' | '?' | '<' | '>' | '|' => {}
            c if c.is_whitespace() => pending_sep = true,
            c => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(c);
            }
        }
    }
    let out: String = out.chars().take(MAX_COMPONENT_CHARS).collect();
    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}

/// File stem for one chapter: zero-padded number plus sanitized title.
///
/// The fixed-width number prefix makes lexicographic order equal chapter-number
/// order and guarantees collision-freedom within a run.
pub fn chapter_stem(number: u32, title: &str) -> String {
    format!("{:03}_{}", number, sanitize_component(title))
}

/// Directory name for a novel's output area.
pub fn title_dir(title: &str) -> String {
    sanitize_component(title)
}

/// File name for a run's final artifact (merged audiobook or archive).
pub fn artifact_name(title: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_component(title), extension)
}
