//! Splits a model reply into plain explanation and tagged foreign-language phrases.
//!
//! Replies mark phrases with a start/end marker pair, e.g. `[TAG]apple[/TAG]`.
//! Generated text is often malformed, so nothing here fails: an unterminated
//! start marker is kept verbatim as plain text.

use crate::types::Segment;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPEN: &str = "[TAG]";
pub const DEFAULT_CLOSE: &str = "[/TAG]";

/// A start/end marker pair delimiting foreign-language phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    pub open: String,
    pub close: String,
}

impl Markers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    fn is_usable(&self) -> bool {
        !self.open.is_empty() && !self.close.is_empty()
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN, DEFAULT_CLOSE)
    }
}

/// Split `text` using the default `[TAG]` / `[/TAG]` markers.
pub fn split(text: &str) -> Vec<Segment> {
    split_with(text, &Markers::default())
}

/// Split `text` into ordered segments.
///
/// Text between a start marker and the next end marker becomes a
/// [`Segment::ForeignPhrase`]; everything else is [`Segment::PlainText`].
/// Empty segments are dropped and neighbouring plain pieces are merged.
pub fn split_with(text: &str, markers: &Markers) -> Vec<Segment> {
    let mut segments = Vec::new();
    if !markers.is_usable() {
        push_plain(&mut segments, text);
        return segments;
    }

    let mut rest = text;
    while !rest.is_empty() {
        let Some(open) = rest.find(&markers.open) else {
            push_plain(&mut segments, rest);
            break;
        };

        let inner = &rest[open + markers.open.len()..];
        let Some(close) = inner.find(&markers.close) else {
            // Unterminated: keep the marker and everything after it as plain text.
            push_plain(&mut segments, rest);
            break;
        };

        push_plain(&mut segments, &rest[..open]);
        let phrase = &inner[..close];
        if !phrase.is_empty() {
            segments.push(Segment::ForeignPhrase(phrase.to_string()));
        }
        rest = &inner[close + markers.close.len()..];
    }

    segments
}

fn push_plain(segments: &mut Vec<Segment>, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if let Some(Segment::PlainText(last)) = segments.last_mut() {
        last.push_str(piece);
    } else {
        segments.push(Segment::PlainText(piece.to_string()));
    }
}

/// The reply with every matched marker pair removed, for reading aloud as a whole.
pub fn strip_markers(text: &str, markers: &Markers) -> String {
    split_with(text, markers)
        .iter()
        .map(Segment::content)
        .collect()
}

/// Keep only the characters the phrase voice can pronounce: ASCII letters and whitespace.
pub fn normalize(phrase: &str) -> String {
    phrase
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect()
}
