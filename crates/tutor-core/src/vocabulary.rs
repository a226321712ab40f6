//! Vocabulary entries and their Markdown rendering

use serde::{Deserialize, Serialize};

/// Maximum synonyms shown per legacy entry
const MAX_SYNONYMS: usize = 3;

/// One vocabulary entry from a `vocabulary_chunk` payload
///
/// Current backends send `{word, content}` where `content` is a Markdown
/// explanation. Older backends sent `{term, meaning, usage, synonyms}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireVocabularyWord")]
pub struct VocabularyWord {
    pub word: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

/// Entry as received; `word` and `term` may both be present
#[derive(Deserialize)]
struct WireVocabularyWord {
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    meaning: Option<String>,
    #[serde(default)]
    usage: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
}

impl From<WireVocabularyWord> for VocabularyWord {
    fn from(wire: WireVocabularyWord) -> Self {
        let word = wire
            .word
            .filter(|w| !w.trim().is_empty())
            .or(wire.term)
            .unwrap_or_default();
        Self {
            word,
            content: wire.content,
            meaning: wire.meaning,
            usage: wire.usage,
            synonyms: wire.synonyms,
        }
    }
}

impl VocabularyWord {
    pub fn new(word: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    fn render(&self, index: usize) -> String {
        let word = if self.word.is_empty() {
            "Unknown"
        } else {
            self.word.as_str()
        };

        if !self.content.is_empty() {
            return format!("{}. **{}**\n\n{}", index + 1, word, self.content.trim());
        }

        let synonyms = self
            .synonyms
            .iter()
            .take(MAX_SYNONYMS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}. **{}**\n   - Meaning: {}\n   - Usage: {}\n   - Synonyms: {}",
            index + 1,
            word,
            or_na(self.meaning.as_deref()),
            or_na(self.usage.as_deref()),
            or_na(Some(synonyms.as_str())),
        )
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A",
    }
}

/// Render entries as a numbered Markdown list, one blank line between entries
pub fn render_vocabulary(words: &[VocabularyWord]) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| word.render(i))
        .collect::<Vec<_>>()
        .join("\n\n")
}
