//! Event router
//!
//! Pure reduction of `(state, frame)` into the next state plus a flow decision.
//! No transport is involved, so every protocol rule is testable by feeding
//! frames directly.

use tracing::{debug, warn};

use super::decoder::Frame;
use super::events::{ChunkContent, TutorEvent};
use super::state::{StreamState, Structured};
use crate::error::StreamError;

/// Whether the stream should keep consuming frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Apply one frame to `state`
///
/// Malformed payloads and unknown events leave the state untouched. Once the
/// stream is no longer active every frame is ignored and `Stop` is returned.
pub fn reduce(mut state: StreamState, frame: &Frame) -> (StreamState, Flow) {
    let flow = apply(&mut state, frame);
    (state, flow)
}

/// Apply frames in order, stopping at the first terminal one
pub fn reduce_all<'a>(
    mut state: StreamState,
    frames: impl IntoIterator<Item = &'a Frame>,
) -> (StreamState, Flow) {
    for frame in frames {
        if apply(&mut state, frame) == Flow::Stop {
            return (state, Flow::Stop);
        }
    }
    (state, Flow::Continue)
}

fn apply(state: &mut StreamState, frame: &Frame) -> Flow {
    if !state.overall.is_active {
        debug!("Ignoring '{}' frame after stream end", frame.event);
        return Flow::Stop;
    }

    let event = match TutorEvent::from_frame(frame) {
        Ok(event) => event,
        Err(e) => {
            warn!("{}", e);
            return Flow::Continue;
        }
    };

    match event {
        TutorEvent::Token { section, token } => {
            let s = state.section_mut(section);
            if s.is_failed() {
                debug!("Dropping {} token after section error", section);
            } else {
                s.text.push_str(&token);
            }
            Flow::Continue
        }
        TutorEvent::Chunk { section, content } => {
            let s = state.section_mut(section);
            if s.is_failed() {
                debug!("Dropping {} chunk after section error", section);
                return Flow::Continue;
            }
            match content {
                ChunkContent::Text(text) => s.text = text,
                // A full vocabulary chunk is itself the completion signal
                ChunkContent::Vocabulary(words) => {
                    debug!("Vocabulary chunk with {} words", words.len());
                    s.structured = Some(Structured::Vocabulary(words));
                    s.is_active = false;
                }
            }
            Flow::Continue
        }
        TutorEvent::SectionDone { section } => {
            state.section_mut(section).is_active = false;
            Flow::Continue
        }
        TutorEvent::SectionError {
            section, message, ..
        } => {
            let s = state.section_mut(section);
            if s.error.is_none() {
                warn!("Section {} failed: {}", section, message);
                s.error = Some(message);
            }
            s.is_active = false;
            Flow::Continue
        }
        TutorEvent::Reply(reply) => {
            state.reply = Some(reply);
            Flow::Continue
        }
        TutorEvent::Done { session_id } => {
            if session_id.is_some() {
                state.session_id = session_id;
            }
            state.finish();
            Flow::Stop
        }
        TutorEvent::Error { message, code } => {
            warn!("Stream failed: {} (code: {:?})", message, code);
            state.fail(StreamError::Protocol { message, code });
            Flow::Stop
        }
        TutorEvent::Unknown(name) => {
            debug!("Ignoring unknown event '{}'", name);
            Flow::Continue
        }
    }
}
