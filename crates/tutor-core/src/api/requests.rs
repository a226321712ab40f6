//! Request bodies and their validation

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use crate::config::{Level, MAX_IMAGE_BYTES};
use crate::error::ApiError;

pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_TEXT_CHARS: usize = 5000;

/// Image types the backend accepts
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Body of `POST /tutor/analyze`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    pub text: String,
    pub level: Level,
}

impl AnalyzeRequest {
    pub fn new(text: impl Into<String>, level: Level) -> Result<Self, ApiError> {
        let text = text.into();
        let chars = text.trim().chars().count();
        if !(MIN_TEXT_CHARS..=MAX_TEXT_CHARS).contains(&chars) {
            return Err(ApiError::InvalidRequest(format!(
                "text must be {MIN_TEXT_CHARS}-{MAX_TEXT_CHARS} characters, got {chars}"
            )));
        }
        Ok(Self { text, level })
    }
}

/// Body of `POST /tutor/analyze-image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeImageRequest {
    /// Base64-encoded image bytes
    pub image_data: String,
    pub mime_type: String,
    pub level: Level,
}

impl AnalyzeImageRequest {
    pub fn new(image: &[u8], mime_type: &str, level: Level) -> Result<Self, ApiError> {
        if !ALLOWED_IMAGE_TYPES.contains(&mime_type) {
            return Err(ApiError::InvalidRequest(format!(
                "unsupported image format: {mime_type} (allowed: {})",
                ALLOWED_IMAGE_TYPES.join(", ")
            )));
        }
        if image.is_empty() {
            return Err(ApiError::InvalidRequest("image is empty".to_string()));
        }
        if image.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::InvalidRequest(format!(
                "image size ({:.2}MB) exceeds limit ({}MB)",
                image.len() as f64 / (1024.0 * 1024.0),
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }
        Ok(Self {
            image_data: BASE64.encode(image),
            mime_type: mime_type.to_string(),
            level,
        })
    }
}

/// Body of `POST /tutor/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub question: String,
    pub level: Level,
}

impl ChatRequest {
    pub fn new(
        session_id: impl Into<String>,
        question: impl Into<String>,
        level: Level,
    ) -> Result<Self, ApiError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ApiError::InvalidRequest("question is empty".to_string()));
        }
        Ok(Self {
            session_id: session_id.into(),
            question,
            level,
        })
    }
}

/// Image MIME type from a file extension
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_text_length() {
        let level = Level::default();
        assert!(AnalyzeRequest::new("too short", level).is_err());
        assert!(AnalyzeRequest::new("x".repeat(MAX_TEXT_CHARS + 1), level).is_err());

        let request =
            AnalyzeRequest::new("The quick brown fox jumps over the lazy dog.", level).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "text": "The quick brown fox jumps over the lazy dog.",
                "level": 3
            })
        );
    }

    #[test]
    fn test_text_length_counts_characters() {
        // 10 Hangul syllables are 30 bytes but 10 characters
        assert!(AnalyzeRequest::new("가나다라마바사아자차", Level::default()).is_ok());
    }

    #[test]
    fn test_image_validation() {
        let level = Level::default();
        assert!(AnalyzeImageRequest::new(b"GIF89a", "image/gif", level).is_err());
        assert!(AnalyzeImageRequest::new(b"", "image/png", level).is_err());
        assert!(
            AnalyzeImageRequest::new(&vec![0u8; MAX_IMAGE_BYTES + 1], "image/png", level).is_err()
        );

        let request = AnalyzeImageRequest::new(b"\x89PNG", "image/png", level).unwrap();
        assert_eq!(request.image_data, "iVBORw==");
    }

    #[test]
    fn test_chat_requires_question() {
        let level = Level::default();
        assert!(ChatRequest::new("s-1", "   ", level).is_err());
        let request = ChatRequest::new("s-1", "What does 'ubiquitous' mean?", level).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap()["session_id"],
            serde_json::json!("s-1")
        );
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("page.JPG")), Some("image/jpeg"));
        assert_eq!(mime_type_for_path(Path::new("scan.webp")), Some("image/webp"));
        assert_eq!(mime_type_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_type_for_path(Path::new("noext")), None);
    }
}
