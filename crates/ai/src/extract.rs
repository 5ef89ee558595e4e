//! Completion extractor.
//!
//! Models asked for "JSON only" still wrap their answer in markdown fences
//! often enough that every non-streaming tool runs its completion text
//! through here. Extraction never fails hard: the caller always gets either
//! a parsed value or the original text back.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ops::Range;

use crate::error::AiError;

/// Result of extracting JSON from completion text.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(Value),
    ParseFailed { original: String },
}

impl Extraction {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::ParseFailed { .. } => None,
        }
    }
}

/// Remove markdown code fences (with or without a language tag) and trim.
pub fn strip_fences(text: &str) -> String {
    scan(text).text.trim().to_string()
}

/// Strip fences and parse the remainder as JSON.
///
/// Text that is already valid JSON is returned as is. When the stripped text
/// is not JSON on its own (prose around the block), the first fenced block
/// and then the outermost `{...}` slice are tried.
pub fn extract_json(text: &str) -> Extraction {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Extraction::Parsed(value);
    }

    let scanned = scan(text);
    let stripped = scanned.text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Extraction::Parsed(value);
    }

    if let Some(range) = scanned.first_block {
        if let Ok(value) = serde_json::from_str::<Value>(scanned.text[range].trim()) {
            debug!("Recovered JSON from first fenced block");
            return Extraction::Parsed(value);
        }
    }

    if let Some(slice) = outermost_object(stripped) {
        if let Ok(value) = serde_json::from_str::<Value>(slice) {
            debug!("Recovered JSON object from surrounding prose");
            return Extraction::Parsed(value);
        }
    }

    Extraction::ParseFailed {
        original: text.to_string(),
    }
}

/// Extract and deserialize into a typed payload.
///
/// Empty text maps to `EmptyResult`; anything else that does not fit `T`
/// maps to `MalformedPayload`.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    match extract_json(text) {
        Extraction::Parsed(value) => serde_json::from_value(value)
            .map_err(|e| AiError::malformed(format!("schema mismatch: {}", e))),
        Extraction::ParseFailed { original } if original.trim().is_empty() => {
            Err(AiError::empty("completion text is empty"))
        }
        Extraction::ParseFailed { original } => Err(AiError::malformed(format!(
            "not JSON: {}",
            preview(&original, 120)
        ))),
    }
}

// ============================================================================
// Fence Scanner
// ============================================================================

struct Scanned {
    text: String,
    /// Byte range in `text` of the first complete fenced block.
    first_block: Option<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Body,
    /// Run of backticks seen so far.
    Ticks(usize),
    /// Reading a possible language tag right after an opening fence.
    Info,
    /// Skipping whitespace after a fence marker.
    Gap,
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.' | '#')
}

fn scan(text: &str) -> Scanned {
    let mut out = String::with_capacity(text.len());
    let mut state = State::Body;
    let mut tag = String::new();
    let mut inside = false;
    let mut block_start = 0;
    let mut first_block = None;
    // Backticks inside a JSON string literal are content, never a fence.
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        // A char may need to be re-dispatched after a state change.
        let mut pending = Some(c);
        while let Some(c) = pending.take() {
            match state {
                State::Body if in_string => {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' || c == '\n' {
                        // JSON strings never span lines; stray quotes in prose end here.
                        in_string = false;
                    }
                }
                State::Body => {
                    if c == '`' {
                        state = State::Ticks(1);
                    } else {
                        in_string = c == '"';
                        out.push(c);
                    }
                }
                State::Ticks(n) => {
                    if c == '`' {
                        state = State::Ticks(n + 1);
                        continue;
                    }
                    if n < 3 {
                        out.extend(std::iter::repeat('`').take(n));
                        state = State::Body;
                    } else if inside {
                        inside = false;
                        if first_block.is_none() {
                            first_block = Some(block_start..out.len());
                        }
                        state = State::Gap;
                    } else {
                        inside = true;
                        tag.clear();
                        state = State::Info;
                    }
                    pending = Some(c);
                }
                State::Info => {
                    if is_tag_char(c) {
                        tag.push(c);
                    } else {
                        block_start = out.len();
                        if !c.is_whitespace() {
                            // Not a tag, the block starts right after the fence.
                            out.push_str(&tag);
                        }
                        tag.clear();
                        state = State::Gap;
                        pending = Some(c);
                    }
                }
                State::Gap => {
                    if !c.is_whitespace() {
                        state = State::Body;
                        pending = Some(c);
                    }
                }
            }
        }
    }

    match state {
        State::Ticks(n) if n < 3 => out.extend(std::iter::repeat('`').take(n)),
        State::Ticks(_) if inside && first_block.is_none() => {
            first_block = Some(block_start..out.len());
        }
        State::Info => out.push_str(&tag),
        _ => {}
    }

    Scanned {
        text: out,
        first_block,
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
