//! Stream state tracking
//!
//! `StreamState` is the single source of truth for one stream. It is replaced,
//! never patched, when a new stream starts.

use std::borrow::Cow;

use super::events::{ChatReply, Section};
use crate::error::StreamError;
use crate::vocabulary::{render_vocabulary, VocabularyWord};

/// Fully parsed content for a section, set by one atomic event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structured {
    Vocabulary(Vec<VocabularyWord>),
}

impl Structured {
    pub fn render(&self) -> String {
        match self {
            Structured::Vocabulary(words) => render_vocabulary(words),
        }
    }
}

/// State of one analysis section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionState {
    /// Accumulated text; append-only while streaming
    pub text: String,
    /// Structured result, takes rendering precedence over `text`
    pub structured: Option<Structured>,
    pub is_active: bool,
    pub error: Option<String>,
}

impl SectionState {
    fn streaming() -> Self {
        Self {
            is_active: true,
            ..Self::default()
        }
    }

    /// Text to show: structured content when present, raw text otherwise
    pub fn display_text(&self) -> Cow<'_, str> {
        match &self.structured {
            Some(structured) => Cow::Owned(structured.render()),
            None => Cow::Borrowed(&self.text),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || self.structured.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Stream-wide status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverallState {
    pub is_active: bool,
    pub error: Option<StreamError>,
}

/// Snapshot of one stream's progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub reading: SectionState,
    pub grammar: SectionState,
    pub vocabulary: SectionState,
    pub overall: OverallState,
    /// Session id the backend reported in its `done` event
    pub session_id: Option<String>,
    /// Answer to a follow-up chat question
    pub reply: Option<ChatReply>,
}

impl StreamState {
    /// Initial empty state, before any stream has started
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state for a stream that has just started
    pub fn started() -> Self {
        Self {
            reading: SectionState::streaming(),
            grammar: SectionState::streaming(),
            vocabulary: SectionState::streaming(),
            overall: OverallState {
                is_active: true,
                error: None,
            },
            session_id: None,
            reply: None,
        }
    }

    pub fn section(&self, section: Section) -> &SectionState {
        match section {
            Section::Reading => &self.reading,
            Section::Grammar => &self.grammar,
            Section::Vocabulary => &self.vocabulary,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut SectionState {
        match section {
            Section::Reading => &mut self.reading,
            Section::Grammar => &mut self.grammar,
            Section::Vocabulary => &mut self.vocabulary,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = (Section, &SectionState)> {
        Section::ALL.into_iter().map(move |s| (s, self.section(s)))
    }

    /// True while any section is still producing output
    pub fn any_section_active(&self) -> bool {
        self.sections().any(|(_, s)| s.is_active)
    }

    /// End the stream without error; partial content is kept
    pub(crate) fn finish(&mut self) {
        self.overall.is_active = false;
        for section in Section::ALL {
            self.section_mut(section).is_active = false;
        }
    }

    /// End the stream with an error; partial content is kept
    pub(crate) fn fail(&mut self, error: StreamError) {
        self.finish();
        self.overall.error = Some(error);
    }
}
