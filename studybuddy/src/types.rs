use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::client::AskError;

// ---------------------------------------------------------------------------
// Response segments
// ---------------------------------------------------------------------------

/// One piece of a model reply, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Segment {
    /// Explanation text outside any phrase markers.
    PlainText(String),
    /// Foreign-language fragment found between a start and an end marker.
    ForeignPhrase(String),
}

impl Segment {
    pub fn content(&self) -> &str {
        match self {
            Segment::PlainText(s) | Segment::ForeignPhrase(s) => s,
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Segment::ForeignPhrase(_))
    }
}

// ---------------------------------------------------------------------------
// Request input
// ---------------------------------------------------------------------------

/// Errors from loading an image attachment.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported image type: {0} (expected jpg, jpeg, png or webp)")]
    UnsupportedType(String),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    /// MIME type, e.g. "image/png".
    pub mime_type: String,
    /// Base64-encoded image data.
    pub data: String,
}

impl ImageInput {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Load a photo from disk. Only the formats the question form accepts are allowed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let mime = mime_for_extension(&ext).ok_or_else(|| ImageError::UnsupportedType(ext.clone()))?;
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(mime, &bytes))
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// A single submission from the question form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyRequest {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,
}

impl StudyRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            question: None,
            image: None,
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        let q = question.into();
        self.question = if q.trim().is_empty() { None } else { Some(q) };
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    /// The trimmed question text, if any.
    pub fn question_text(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// A request needs at least a question or a photo.
    pub fn validate(&self) -> Result<(), AskError> {
        if self.question_text().is_none() && self.image.is_none() {
            return Err(AskError::EmptyRequest);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Catalog and answers
// ---------------------------------------------------------------------------

/// A model entry from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model ID as sent to the API (without the `models/` prefix).
    pub id: String,
    pub display_name: String,
    /// Whether the model accepts `generateContent` calls.
    pub supports_generate: bool,
}

/// Result of one successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The model that produced the reply.
    pub model: String,
    pub raw_text: String,
    pub segments: Vec<Segment>,
}

impl Answer {
    pub fn foreign_phrases(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| s.is_foreign())
            .map(Segment::content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_question_or_image_is_rejected() {
        let req = StudyRequest::new("수학").with_question("   ");
        assert!(matches!(req.validate(), Err(AskError::EmptyRequest)));
    }

    #[test]
    fn request_with_only_image_is_valid() {
        let req = StudyRequest::new("수학").with_image(ImageInput::from_bytes("image/png", b"\x89PNG"));
        assert!(req.validate().is_ok());
        assert!(req.question_text().is_none());
    }

    #[test]
    fn image_from_path_checks_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("homework.JPG");
        std::fs::write(&ok, b"jpegdata").unwrap();
        let img = ImageInput::from_path(&ok).unwrap();
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.data, BASE64.encode(b"jpegdata"));

        let bad = dir.path().join("homework.gif");
        std::fs::write(&bad, b"gif").unwrap();
        assert!(matches!(
            ImageInput::from_path(&bad),
            Err(ImageError::UnsupportedType(ext)) if ext == "gif"
        ));
    }

    #[test]
    fn answer_lists_foreign_phrases_in_order() {
        let answer = Answer {
            model: "gemini-1.5-flash".into(),
            raw_text: String::new(),
            segments: vec![
                Segment::PlainText("사과는 ".into()),
                Segment::ForeignPhrase("apple".into()),
                Segment::PlainText(" 이고 바나나는 ".into()),
                Segment::ForeignPhrase("banana".into()),
            ],
        };
        let phrases: Vec<_> = answer.foreign_phrases().collect();
        assert_eq!(phrases, vec!["apple", "banana"]);
    }
}
