//! End-to-end tests for the stream pipeline through the public API
//!
//! Wire text goes in, StreamState comes out; no network involved.

use bytes::Bytes;
use futures::StreamExt;
use tutor_core::stream::{
    reduce, reduce_all, ByteStream, Flow, FrameDecoder, StreamOutcome, StreamState, Structured,
    TutorStream,
};
use tutor_core::{Section, StreamError, VocabularyWord};

/// A realistic backend transcript: heartbeats, interleaved sections,
/// a vocabulary chunk and the final done event with the session id.
const TRANSCRIPT: &str = concat!(
    ": heartbeat\n\n",
    "event: reading_token\ndata: {\"token\": \"The fox / \"}\n\n",
    "event: grammar_token\ndata: {\"token\": \"주어: The fox\"}\n\n",
    "event: reading_token\ndata: {\"token\": \"jumps\"}\n\n",
    "event: reading_done\ndata: {\"section\": \"reading\"}\n\n",
    ": heartbeat\n\n",
    "event: vocabulary_chunk\ndata: {\"words\": [{\"word\": \"fox\", \"content\": \"여우\"}]}\n\n",
    "event: grammar_done\ndata: {\"section\": \"grammar\"}\n\n",
    "event: vocabulary_done\ndata: {\"section\": \"vocabulary\"}\n\n",
    "event: done\ndata: {\"session_id\": \"3f1c\", \"status\": \"complete\"}\n\n",
);

fn decode(chunks: &[&str]) -> Vec<tutor_core::stream::Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in chunks {
        decoder.push(chunk);
        frames.extend(decoder.frames());
    }
    decoder.finish();
    frames.extend(decoder.frames());
    frames
}

fn body(chunks: Vec<String>) -> ByteStream {
    futures::stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, anyhow::Error>(Bytes::from(c))),
    )
    .boxed()
}

#[test]
fn test_transcript_reduces_to_final_state() {
    let frames = decode(&[TRANSCRIPT]);
    let (state, flow) = reduce_all(StreamState::started(), &frames);

    assert_eq!(flow, Flow::Stop);
    assert_eq!(state.reading.text, "The fox / jumps");
    assert_eq!(state.grammar.text, "주어: The fox");
    assert_eq!(
        state.vocabulary.structured,
        Some(Structured::Vocabulary(vec![VocabularyWord::new("fox", "여우")]))
    );
    assert_eq!(state.session_id.as_deref(), Some("3f1c"));
    assert!(!state.overall.is_active);
    assert!(state.overall.error.is_none());
    assert!(state.sections().all(|(_, s)| !s.is_active && s.error.is_none()));
}

#[test]
fn test_chunking_does_not_change_the_result() {
    let whole = reduce_all(StreamState::started(), &decode(&[TRANSCRIPT])).0;

    for size in [1, 2, 3, 7, 16, 64] {
        let chars: Vec<char> = TRANSCRIPT.chars().collect();
        let pieces: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();
        let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();

        let mut state = StreamState::started();
        for frame in decode(&pieces) {
            let (next, flow) = reduce(state, &frame);
            state = next;
            if flow == Flow::Stop {
                break;
            }
        }
        assert_eq!(state, whole, "chunk size {size}");
    }
}

#[test]
fn test_non_json_data_line_between_valid_frames() {
    let frames = decode(&[
        "event: reading_token\ndata: {\"token\":\"A\"}\n\n",
        "data: not-json\n\n",
        "event: reading_token\ndata: {\"token\":\"B\"}\n\n",
    ]);
    assert_eq!(frames.len(), 3);

    let (state, flow) = reduce_all(StreamState::started(), &frames);
    assert_eq!(flow, Flow::Continue);
    assert_eq!(state.reading.text, "AB");
    assert!(state.overall.error.is_none());
}

#[tokio::test]
async fn test_controller_runs_transcript_in_byte_sized_reads() {
    // Split on byte boundaries, including inside multi-byte characters
    let chunks: Vec<anyhow::Result<Bytes>> = TRANSCRIPT
        .as_bytes()
        .chunks(5)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let controller = TutorStream::new();
    let outcome = controller
        .start_stream(|| async move { Ok(futures::stream::iter(chunks).boxed()) })
        .await;

    let StreamOutcome::Finished(state) = outcome else {
        panic!("stream was cancelled");
    };
    assert_eq!(state.grammar.text, "주어: The fox");
    assert_eq!(state.section(Section::Reading).text, "The fox / jumps");
    assert_eq!(state.session_id.as_deref(), Some("3f1c"));
}

#[tokio::test]
async fn test_protocol_error_after_section_error() {
    let controller = TutorStream::new();
    let outcome = controller
        .start_stream(|| async {
            Ok(body(vec![
                "event: reading_token\ndata: {\"token\":\"partial\"}\n\n".to_string(),
                "event: vocabulary_error\ndata: {\"message\":\"LLM API failed\"}\n\n".to_string(),
                "event: error\ndata: {\"message\":\"graph crashed\",\"code\":\"processing_error\"}\n\n"
                    .to_string(),
            ]))
        })
        .await;

    let StreamOutcome::Finished(state) = outcome else {
        panic!("stream was cancelled");
    };
    assert_eq!(state.reading.text, "partial");
    assert_eq!(state.vocabulary.error.as_deref(), Some("LLM API failed"));
    assert_eq!(
        state.overall.error,
        Some(StreamError::Protocol {
            message: "graph crashed".to_string(),
            code: Some("processing_error".to_string()),
        })
    );
    assert!(!state.any_section_active());
}

#[tokio::test]
async fn test_subscriber_sees_progress_then_terminal_state() {
    let controller = TutorStream::new();
    let mut updates = controller.subscribe();

    let (tx, rx) = futures::channel::mpsc::unbounded::<anyhow::Result<Bytes>>();
    let running = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .start_stream(move || async move { Ok(rx.boxed()) })
                .await
        })
    };

    tx.unbounded_send(Ok(Bytes::from_static(
        b"event: reading_token\ndata: {\"token\":\"Hi\"}\n\n",
    )))
    .unwrap();
    let seen = updates
        .wait_for(|state| state.reading.text == "Hi")
        .await
        .unwrap()
        .clone();
    assert!(seen.overall.is_active);
    assert!(seen.reading.is_active);

    tx.unbounded_send(Ok(Bytes::from_static(b"event: done\ndata: {}\n\n")))
        .unwrap();
    let seen = updates
        .wait_for(|state| !state.overall.is_active)
        .await
        .unwrap()
        .clone();
    assert_eq!(seen.reading.text, "Hi");

    assert!(matches!(
        running.await.unwrap(),
        StreamOutcome::Finished(_)
    ));
}
