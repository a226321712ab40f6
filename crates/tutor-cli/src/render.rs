//! Terminal rendering of stream snapshots

use std::io::{self, Write};

use tutor_core::stream::{SectionState, StreamState};
use tutor_core::Section;
use unicode_width::UnicodeWidthStr;

/// Panel title shown above a section
pub fn section_title(section: Section) -> &'static str {
    match section {
        Section::Reading => "독해 훈련",
        Section::Grammar => "문법 구조 이해",
        Section::Vocabulary => "어휘 어원 학습",
    }
}

fn section_status(section: &SectionState) -> String {
    if section.is_failed() {
        "failed".to_string()
    } else if section.structured.is_some() {
        "ready".to_string()
    } else if section.is_active && section.text.is_empty() {
        "waiting".to_string()
    } else if section.is_active {
        format!("{} chars", section.text.chars().count())
    } else if section.has_content() {
        "done".to_string()
    } else {
        "empty".to_string()
    }
}

/// One-line summary of every section, for the progress line
pub fn progress_line(state: &StreamState) -> String {
    state
        .sections()
        .map(|(section, s)| format!("{} {}", section, section_status(s)))
        .collect::<Vec<_>>()
        .join(" · ")
}

/// Prints new text of one section as it streams in
#[derive(Debug)]
pub struct LiveFollower {
    section: Section,
    printed: String,
}

impl LiveFollower {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            printed: String::new(),
        }
    }

    /// Text not printed yet; a wholesale replacement starts over on a new line
    pub fn delta(&mut self, state: &StreamState) -> Option<String> {
        let text = &state.section(self.section).text;
        let delta = match text.strip_prefix(self.printed.as_str()) {
            Some(rest) => {
                let rest = rest.to_string();
                self.printed.push_str(&rest);
                rest
            }
            None => {
                self.printed = text.clone();
                format!("\n{text}")
            }
        };
        (!delta.is_empty()).then_some(delta)
    }
}

fn write_title(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.width()))
}

/// Full rendering of a finished stream, leaving out a section already shown live
pub fn write_final(
    out: &mut impl Write,
    state: &StreamState,
    skip: Option<Section>,
) -> io::Result<()> {
    for (section, s) in state.sections() {
        if skip == Some(section) && s.error.is_none() {
            continue;
        }
        write_title(out, section_title(section))?;
        if let Some(error) = &s.error {
            writeln!(out, "[error] {error}")?;
        }
        let text = s.display_text();
        if text.trim().is_empty() {
            if s.error.is_none() {
                writeln!(out, "(no {section} analysis)")?;
            }
        } else {
            writeln!(out, "{}", text.trim_end())?;
        }
        writeln!(out)?;
    }

    if let Some(reply) = &state.reply {
        write_title(out, "답변")?;
        writeln!(out, "{}", reply.content.trim_end())?;
        writeln!(out)?;
    }

    if let Some(error) = &state.overall.error {
        writeln!(out, "[stream failed] {}", error.message())?;
    }
    Ok(())
}
