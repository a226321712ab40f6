//! Core library for the tutor client
//!
//! The interesting part lives in [`stream`]: an incremental interpreter for the
//! backend's Server-Sent-Events analysis stream. The rest is the plumbing a
//! complete client needs around it: HTTP transport, configuration and a local
//! session cache.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod stream;
pub mod vocabulary;

pub use api::TutorClient;
pub use config::{Level, TutorConfig};
pub use error::{ApiError, StreamError};
pub use session::SessionStore;
pub use stream::{Section, StreamOutcome, StreamState, TutorStream};
pub use vocabulary::VocabularyWord;
