//! Request plumbing for the tutor backend
//!
//! Builds the requests and hands back the raw SSE body; interpretation of the
//! body is left to [`crate::stream`].

mod client;
mod requests;

pub use client::{HealthStatus, TutorClient};
pub use requests::{
    mime_type_for_path, AnalyzeImageRequest, AnalyzeRequest, ChatRequest, ALLOWED_IMAGE_TYPES,
    MAX_TEXT_CHARS, MIN_TEXT_CHARS,
};
