//! Tutor stream events
//!
//! Typed view of a decoded frame. Event names are part of the wire contract:
//! `<section>_token`, `<section>_chunk`, `<section>_done`, `<section>_error`,
//! plus the unscoped `done`, `error` and `chat_chunk`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decoder::Frame;
use crate::vocabulary::VocabularyWord;

/// End-of-stream data literal some backends send instead of a `done` event
pub const DONE_MARKER: &str = "[DONE]";

/// Message used when a section error carries none
pub const SECTION_ERROR_FALLBACK: &str = "Section analysis failed";

/// Message used when an unscoped error carries none
pub const STREAM_ERROR_FALLBACK: &str = "Analysis failed";

/// One of the independent analysis channels of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Reading,
    Grammar,
    Vocabulary,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Reading, Section::Grammar, Section::Vocabulary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Reading => "reading",
            Section::Grammar => "grammar",
            Section::Vocabulary => "vocabulary",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Payload key older backends used instead of `content` for full chunks
    fn legacy_content_key(&self) -> Option<&'static str> {
        match self {
            Section::Reading => Some("summary"),
            Section::Grammar => Some("analysis"),
            Section::Vocabulary => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full content carried by a `<section>_chunk` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkContent {
    Text(String),
    Vocabulary(Vec<VocabularyWord>),
}

/// Answer to a follow-up chat question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_reply_role")]
    pub role: String,
}

fn default_reply_role() -> String {
    "assistant".to_string()
}

/// Events the router understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TutorEvent {
    /// Incremental text for a section
    Token { section: Section, token: String },
    /// Full replacement content for a section
    Chunk {
        section: Section,
        content: ChunkContent,
    },
    /// Section finished
    SectionDone { section: Section },
    /// Section failed; other sections carry on
    SectionError {
        section: Section,
        message: String,
        code: Option<String>,
    },
    /// Follow-up chat answer
    Reply(ChatReply),
    /// Whole stream finished
    Done { session_id: Option<String> },
    /// Whole stream failed
    Error {
        message: String,
        code: Option<String>,
    },
    /// Event name this client does not know; ignored
    Unknown(String),
}

/// Frame whose payload could not be decoded
#[derive(Debug, thiserror::Error)]
#[error("malformed payload for event '{event}': {source}")]
pub struct MalformedFrame {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Deserialize)]
struct TokenPayload {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct VocabularyPayload {
    #[serde(default)]
    words: Vec<VocabularyWord>,
}

#[derive(Deserialize)]
struct DonePayload {
    #[serde(default)]
    session_id: Option<String>,
}

impl TutorEvent {
    /// Interpret a frame
    ///
    /// Unknown event names are returned as `Unknown` without looking at the
    /// payload. A `done` event never fails: its payload is optional metadata.
    /// The `[DONE]` literal only ends the stream on an unnamed or `done` frame.
    pub fn from_frame(frame: &Frame) -> Result<Self, MalformedFrame> {
        if frame.data == DONE_MARKER && matches!(frame.event.as_str(), "" | "done") {
            return Ok(TutorEvent::Done { session_id: None });
        }

        let malformed = |source| MalformedFrame {
            event: frame.event.clone(),
            source,
        };

        match frame.event.as_str() {
            "done" => {
                let session_id = serde_json::from_str::<DonePayload>(&frame.data)
                    .ok()
                    .and_then(|p| p.session_id);
                return Ok(TutorEvent::Done { session_id });
            }
            "error" => {
                let (message, code) =
                    error_fields(&frame.data, STREAM_ERROR_FALLBACK).map_err(malformed)?;
                return Ok(TutorEvent::Error { message, code });
            }
            "chat_chunk" => {
                let reply: ChatReply = serde_json::from_str(&frame.data).map_err(malformed)?;
                return Ok(TutorEvent::Reply(reply));
            }
            _ => {}
        }

        let Some((section, kind)) = frame
            .event
            .split_once('_')
            .and_then(|(section, kind)| Some((Section::parse(section)?, kind)))
        else {
            return Ok(TutorEvent::Unknown(frame.event.clone()));
        };

        let event = match kind {
            "token" => {
                let payload: TokenPayload =
                    serde_json::from_str(&frame.data).map_err(malformed)?;
                TutorEvent::Token {
                    section,
                    token: payload.token,
                }
            }
            "chunk" => TutorEvent::Chunk {
                section,
                content: parse_chunk(section, &frame.data).map_err(malformed)?,
            },
            "done" => {
                // Payload is informational (`{"section": ...}`) but must still be JSON
                serde_json::from_str::<Value>(&frame.data).map_err(malformed)?;
                TutorEvent::SectionDone { section }
            }
            "error" => {
                let (message, code) =
                    error_fields(&frame.data, SECTION_ERROR_FALLBACK).map_err(malformed)?;
                TutorEvent::SectionError {
                    section,
                    message,
                    code,
                }
            }
            _ => TutorEvent::Unknown(frame.event.clone()),
        };
        Ok(event)
    }
}

/// Message and code of an error payload
///
/// Only a JSON syntax error fails. A missing or non-string `message` falls
/// back to `fallback`; a numeric `code` is kept as its decimal text.
fn error_fields(
    data: &str,
    fallback: &str,
) -> Result<(String, Option<String>), serde_json::Error> {
    let json: Value = serde_json::from_str(data)?;
    let message = json
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(fallback)
        .to_string();
    let code = match json.get("code") {
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    };
    Ok((message, code))
}

fn parse_chunk(section: Section, data: &str) -> Result<ChunkContent, serde_json::Error> {
    if section == Section::Vocabulary {
        let payload: VocabularyPayload = serde_json::from_str(data)?;
        return Ok(ChunkContent::Vocabulary(payload.words));
    }

    let json: Value = serde_json::from_str(data)?;
    let text = ["content"]
        .into_iter()
        .chain(section.legacy_content_key())
        .find_map(|key| json.get(key).and_then(|v| v.as_str()))
        .map(str::to_string);
    match text {
        Some(text) => Ok(ChunkContent::Text(text)),
        None => Ok(ChunkContent::Text(serde_json::to_string_pretty(&json)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(event: &str, data: &str) -> TutorEvent {
        TutorEvent::from_frame(&Frame::new(event, data)).unwrap()
    }

    #[test]
    fn test_section_names() {
        for section in Section::ALL {
            assert_eq!(Section::parse(section.as_str()), Some(section));
        }
        assert_eq!(Section::parse("chat"), None);
    }

    #[test]
    fn test_token_defaults_to_empty() {
        assert_eq!(
            parse("grammar_token", "{}"),
            TutorEvent::Token {
                section: Section::Grammar,
                token: String::new()
            }
        );
    }

    #[test]
    fn test_reading_chunk_content_and_legacy_keys() {
        assert_eq!(
            parse("reading_chunk", r#"{"content":"full"}"#),
            TutorEvent::Chunk {
                section: Section::Reading,
                content: ChunkContent::Text("full".to_string())
            }
        );
        assert_eq!(
            parse("reading_chunk", r#"{"summary":"old"}"#),
            TutorEvent::Chunk {
                section: Section::Reading,
                content: ChunkContent::Text("old".to_string())
            }
        );
        assert_eq!(
            parse("grammar_chunk", r#"{"analysis":"old"}"#),
            TutorEvent::Chunk {
                section: Section::Grammar,
                content: ChunkContent::Text("old".to_string())
            }
        );
    }

    #[test]
    fn test_chunk_without_known_key_is_pretty_printed() {
        match parse("grammar_chunk", r#"{"score":90}"#) {
            TutorEvent::Chunk {
                content: ChunkContent::Text(text),
                ..
            } => assert_eq!(text, "{\n  \"score\": 90\n}"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_vocabulary_chunk() {
        assert_eq!(
            parse(
                "vocabulary_chunk",
                r#"{"words":[{"word":"fox","content":"여우"}]}"#
            ),
            TutorEvent::Chunk {
                section: Section::Vocabulary,
                content: ChunkContent::Vocabulary(vec![VocabularyWord::new("fox", "여우")])
            }
        );
    }

    #[test]
    fn test_vocabulary_chunk_mixing_word_and_term() {
        assert_eq!(
            parse(
                "vocabulary_chunk",
                r#"{"words":[{"word":"fox","term":"fox","content":"여우"},{"term":"den"}]}"#
            ),
            TutorEvent::Chunk {
                section: Section::Vocabulary,
                content: ChunkContent::Vocabulary(vec![
                    VocabularyWord::new("fox", "여우"),
                    VocabularyWord::new("den", ""),
                ])
            }
        );
    }

    #[test]
    fn test_errors_with_and_without_message() {
        assert_eq!(
            parse("vocabulary_error", r#"{"message":"LLM API failed"}"#),
            TutorEvent::SectionError {
                section: Section::Vocabulary,
                message: "LLM API failed".to_string(),
                code: None
            }
        );
        assert_eq!(
            parse("error", r#"{"code":"processing_error"}"#),
            TutorEvent::Error {
                message: STREAM_ERROR_FALLBACK.to_string(),
                code: Some("processing_error".to_string())
            }
        );
    }

    #[test]
    fn test_error_fields_are_read_loosely() {
        assert_eq!(
            parse("error", r#"{"message":"LLM API failed","code":500}"#),
            TutorEvent::Error {
                message: "LLM API failed".to_string(),
                code: Some("500".to_string())
            }
        );
        assert_eq!(
            parse("grammar_error", r#"{"message":{"detail":"boom"},"code":null}"#),
            TutorEvent::SectionError {
                section: Section::Grammar,
                message: SECTION_ERROR_FALLBACK.to_string(),
                code: None
            }
        );
        assert_eq!(
            parse("error", r#""upstream closed""#),
            TutorEvent::Error {
                message: STREAM_ERROR_FALLBACK.to_string(),
                code: None
            }
        );
        assert!(TutorEvent::from_frame(&Frame::new("error", "not-json")).is_err());
    }

    #[test]
    fn test_done_marker_only_on_unnamed_or_done_frames() {
        assert_eq!(parse("done", DONE_MARKER), TutorEvent::Done { session_id: None });
        assert!(TutorEvent::from_frame(&Frame::new("reading_token", DONE_MARKER)).is_err());
        assert!(TutorEvent::from_frame(&Frame::new("vocabulary_chunk", DONE_MARKER)).is_err());
    }

    #[test]
    fn test_done_tolerates_any_payload() {
        assert_eq!(
            parse("done", r#"{"session_id":"abc","status":"complete"}"#),
            TutorEvent::Done {
                session_id: Some("abc".to_string())
            }
        );
        assert_eq!(parse("done", "not-json"), TutorEvent::Done { session_id: None });
        assert_eq!(parse("", DONE_MARKER), TutorEvent::Done { session_id: None });
    }

    #[test]
    fn test_chat_chunk() {
        assert_eq!(
            parse("chat_chunk", r#"{"content":"It means everywhere."}"#),
            TutorEvent::Reply(ChatReply {
                content: "It means everywhere.".to_string(),
                role: "assistant".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_events() {
        assert_eq!(
            parse("summary_token", "not-json"),
            TutorEvent::Unknown("summary_token".to_string())
        );
        assert_eq!(
            parse("reading_progress", "{}"),
            TutorEvent::Unknown("reading_progress".to_string())
        );
        assert_eq!(parse("", "{}"), TutorEvent::Unknown(String::new()));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let err = TutorEvent::from_frame(&Frame::new("reading_token", "not-json")).unwrap_err();
        assert_eq!(err.event, "reading_token");
    }
}
