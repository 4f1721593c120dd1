//! Speech synthesis for answers and embedded foreign-language phrases.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use url::Url;

pub const TRANSLATE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// The translate endpoint rejects longer inputs.
pub const MAX_CHUNK_CHARS: usize = 100;

const SENTENCE_BREAKS: &[char] = &['.', ',', '!', '?', ';', ':', '\n', '。', '！', '？'];

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("nothing to speak")]
    EmptyText,

    #[error("speech service returned HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid speech endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Turns text into audio bytes (MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `lang` (e.g. "ko", "en").
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, TtsError>;
}

/// Google Translate's public text-to-speech endpoint.
pub struct TranslateTts {
    client: Client,
    endpoint: String,
}

impl TranslateTts {
    pub fn new() -> Self {
        Self::with_endpoint(TRANSLATE_TTS_URL)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    fn chunk_url(&self, chunk: &str, lang: &str, idx: usize, total: usize) -> Result<Url, TtsError> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang),
                ("q", chunk),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )?)
    }
}

impl Default for TranslateTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for TranslateTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, TtsError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::EmptyText);
        }

        // MP3 frames concatenate cleanly, so chunk audio is simply appended.
        let mut audio = BytesMut::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, lang, idx, chunks.len())?;
            let resp = self
                .client
                .get(url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TtsError::Http {
                    status: status.as_u16(),
                });
            }
            audio.extend_from_slice(&resp.bytes().await?);
        }

        tracing::debug!(lang, chunks = chunks.len(), bytes = audio.len(), "synthesized speech");
        Ok(audio.freeze())
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Breaks after sentence punctuation first, then between words; a single word
/// longer than the limit is cut on character boundaries. Short neighbouring
/// pieces are joined back together to keep the request count low.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in sentence_pieces(text) {
        for part in fit_piece(&piece, max_chars) {
            if current.is_empty() {
                current = part;
            } else if current.chars().count() + 1 + part.chars().count() <= max_chars {
                current.push(' ');
                current.push_str(&part);
            } else {
                chunks.push(std::mem::replace(&mut current, part));
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn sentence_pieces(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();
    for c in text.chars() {
        buf.push(c);
        if SENTENCE_BREAKS.contains(&c) {
            let piece = buf.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            buf.clear();
        }
    }
    let piece = buf.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
    pieces
}

fn fit_piece(piece: &str, max_chars: usize) -> Vec<String> {
    if piece.chars().count() <= max_chars {
        return vec![piece.to_string()];
    }

    let mut parts = Vec::new();
    for word in piece.split_whitespace() {
        if word.chars().count() <= max_chars {
            parts.push(word.to_string());
            continue;
        }
        let chars: Vec<char> = word.chars().collect();
        parts.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sentences_are_joined() {
        assert_eq!(chunk_text("Hello. How are you?", 100), vec!["Hello. How are you?"]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("  \n ", 100).is_empty());
    }

    #[test]
    fn breaks_on_sentences_when_over_limit() {
        assert_eq!(chunk_text("One. Two. Three.", 10), vec!["One. Two.", "Three."]);
    }

    #[test]
    fn overlong_word_is_hard_split() {
        let word = "a".repeat(250);
        let chunks = chunk_text(&word, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn chunks_respect_limit_for_korean_text() {
        let text = "사과는 영어로 apple 이라고 해요 ".repeat(20);
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, text.split_whitespace().count());
    }

    #[test]
    fn chunk_url_encodes_query() {
        let tts = TranslateTts::new();
        let url = tts.chunk_url("Thank you", "en", 0, 1).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "Thank you".into())));
        assert!(pairs.contains(&("tl".into(), "en".into())));
        assert!(pairs.contains(&("textlen".into(), "9".into())));
        assert_eq!(url.host_str(), Some("translate.google.com"));
    }

    #[tokio::test]
    async fn blank_text_fails_without_network() {
        let tts = TranslateTts::with_endpoint("http://127.0.0.1:9/translate_tts");
        assert!(matches!(tts.synthesize("   ", "ko").await, Err(TtsError::EmptyText)));
    }
}
