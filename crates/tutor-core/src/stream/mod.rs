//! Incremental interpretation of the tutor's SSE analysis stream
//!
//! Transport bytes → [`FrameDecoder`] → [`reduce`] → [`StreamState`] snapshot.
//! [`TutorStream`] ties the pieces together and guarantees that at most one
//! stream mutates the state at a time.

pub mod cancellation;
pub mod controller;
pub mod decoder;
pub mod events;
pub mod reducer;
pub mod state;

pub use cancellation::StreamCancellation;
pub use controller::{ByteStream, StreamOutcome, TutorStream};
pub use decoder::{Frame, FrameDecoder, Utf8Carry};
pub use events::{ChatReply, ChunkContent, MalformedFrame, Section, TutorEvent};
pub use reducer::{reduce, reduce_all, Flow};
pub use state::{OverallState, SectionState, StreamState, Structured};
