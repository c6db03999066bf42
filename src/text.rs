//! Sentence-boundary chunking for speech synthesis.
//!
//! Speech services cap input size, so long chapter bodies are split into
//! chunks that never break mid-sentence. A single sentence longer than the
//! limit is split at word boundaries as a last resort.

/// Default per-chunk character limit, matching common TTS service caps.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4500;

/// Split `text` into chunks of at most `max_chars` characters, breaking only
/// at sentence boundaries (`.`, `!`, `?` followed by whitespace). Sentences
/// within a chunk are joined with a single space. Empty input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut String, current_len: &mut usize, chunks: &mut Vec<String>| {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
            *current_len = 0;
        }
    };

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if sentence_len > max_chars {
            flush(&mut current, &mut current_len, &mut chunks);
            chunks.extend(split_long_sentence(sentence, max_chars));
            continue;
        }
        let sep = usize::from(current_len > 0);
        if current_len + sep + sentence_len > max_chars {
            flush(&mut current, &mut current_len, &mut chunks);
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split on sentence-terminal punctuation followed by whitespace. The
/// terminator stays with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, c) in text.char_indices() {
        if prev_terminal && c.is_whitespace() {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i;
        }
        prev_terminal = matches!(c, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Word-boundary fallback for a sentence that alone exceeds the limit.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let mut buf = String::new();
            let mut buf_len = 0usize;
            for c in word.chars() {
                if buf_len == max_chars {
                    pieces.push(std::mem::take(&mut buf));
                    buf_len = 0;
                }
                buf.push(c);
                buf_len += 1;
            }
            current = buf;
            current_len = buf_len;
            continue;
        }
        let sep = usize::from(current_len > 0);
        if current_len + sep + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
