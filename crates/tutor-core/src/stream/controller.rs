//! Stream controller
//!
//! Runs at most one live stream per handle. Transport bytes pass through the
//! UTF-8 carry and the frame decoder into the reducer; every reduction is
//! published to subscribers as a new snapshot.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancellation::StreamCancellation;
use super::decoder::{FrameDecoder, Utf8Carry};
use super::reducer::{reduce, Flow};
use super::state::StreamState;
use crate::error::StreamError;

/// Response body as produced by the transport
pub type ByteStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// How a call to `start_stream` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Terminal state of the stream (done, error event, transport failure or EOF)
    Finished(StreamState),
    /// Superseded by a newer stream or reset; nothing was recorded
    Cancelled,
}

#[derive(Debug)]
struct LiveStream {
    /// Bumped on every start and reset; a run may only publish under its own
    generation: u64,
    cancellation: StreamCancellation,
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<StreamState>,
    live: Mutex<LiveStream>,
}

impl Shared {
    /// Mutate the published state if `generation` is still the live stream
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut StreamState) -> R) -> Option<R> {
        let live = self.live.lock();
        if live.generation != generation || live.cancellation.is_cancelled() {
            return None;
        }
        let mut result = None;
        self.state.send_modify(|state| result = Some(f(state)));
        result
    }
}

/// Handle owning the single StreamState slot
///
/// Clones share the slot, so a clone can start a stream that supersedes one
/// running elsewhere.
#[derive(Debug, Clone)]
pub struct TutorStream {
    shared: Arc<Shared>,
}

impl TutorStream {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StreamState::new());
        Self {
            shared: Arc::new(Shared {
                state,
                live: Mutex::new(LiveStream {
                    generation: 0,
                    cancellation: StreamCancellation::new(),
                }),
            }),
        }
    }

    /// Latest published state
    pub fn snapshot(&self) -> StreamState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    /// Cancel any live stream and return to the initial empty state
    pub fn reset(&self) {
        let mut live = self.shared.live.lock();
        live.cancellation.renew();
        live.generation += 1;
        self.shared.state.send_replace(StreamState::new());
        info!("Tutor stream reset (generation {})", live.generation);
    }

    /// Run a stream to completion
    ///
    /// Any stream already running on this slot is cancelled before the state
    /// is reset. `fetch` is only called after the reset.
    pub async fn start_stream<F, Fut>(&self, fetch: F) -> StreamOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ByteStream>>,
    {
        let (generation, token) = self.begin();
        StreamRun::new(Arc::clone(&self.shared), generation)
            .run(token, fetch)
            .await
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut live = self.shared.live.lock();
        live.cancellation.renew();
        live.generation += 1;
        self.shared.state.send_replace(StreamState::started());
        info!("Tutor stream #{} started", live.generation);
        (live.generation, live.cancellation.token())
    }
}

impl Default for TutorStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Read loop for one stream
struct StreamRun {
    shared: Arc<Shared>,
    generation: u64,
    utf8: Utf8Carry,
    decoder: FrameDecoder,
    stream_start: Instant,
    frame_count: usize,
    bytes_received: usize,
}

impl StreamRun {
    fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            utf8: Utf8Carry::new(),
            decoder: FrameDecoder::new(),
            stream_start: Instant::now(),
            frame_count: 0,
            bytes_received: 0,
        }
    }

    async fn run<F, Fut>(mut self, token: CancellationToken, fetch: F) -> StreamOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ByteStream>>,
    {
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return self.cancelled(),
            response = fetch() => response,
        };

        let mut body = match response {
            Ok(body) => body,
            Err(e) => {
                warn!("Tutor stream #{} request failed: {:#}", self.generation, e);
                return self.fail(StreamError::from_transport(&e));
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled(),
                next = body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    self.bytes_received += bytes.len();
                    debug!(
                        "SSE chunk received: {} bytes (total: {} bytes)",
                        bytes.len(),
                        self.bytes_received
                    );
                    let text = self.utf8.decode(&bytes);
                    self.decoder.push(&text);
                }
                Some(Err(e)) => {
                    warn!(
                        "Tutor stream #{} read failed after {} bytes: {:#}",
                        self.generation, self.bytes_received, e
                    );
                    return self.fail(StreamError::from_transport(&e));
                }
                None => {
                    let tail = self.utf8.finish();
                    self.decoder.push(&tail);
                    self.decoder.finish();
                    if let Some(outcome) = self.drain() {
                        return outcome;
                    }
                    warn!(
                        "Tutor stream #{} closed without a done event ({} frames)",
                        self.generation, self.frame_count
                    );
                    return self.conclude(StreamState::finish);
                }
            }

            if let Some(outcome) = self.drain() {
                return outcome;
            }
        }
    }

    /// Reduce every frame the decoder can produce; `Some` once the stream is over
    fn drain(&mut self) -> Option<StreamOutcome> {
        while let Some(frame) = self.decoder.next_frame() {
            self.frame_count += 1;
            debug!(
                "SSE frame #{} at {:?}: event={}",
                self.frame_count,
                self.stream_start.elapsed(),
                frame.event
            );

            let applied = self.shared.update(self.generation, |state| {
                let (next, flow) = reduce(std::mem::take(state), &frame);
                *state = next;
                (flow == Flow::Stop).then(|| state.clone())
            });

            match applied {
                None => return Some(self.cancelled()),
                Some(None) => {}
                Some(Some(terminal)) => {
                    self.log_finish(&terminal);
                    return Some(StreamOutcome::Finished(terminal));
                }
            }
        }
        None
    }

    fn fail(&self, error: StreamError) -> StreamOutcome {
        self.conclude(|state| state.fail(error))
    }

    fn conclude(&self, f: impl FnOnce(&mut StreamState)) -> StreamOutcome {
        let terminal = self.shared.update(self.generation, |state| {
            f(state);
            state.clone()
        });
        match terminal {
            Some(terminal) => {
                self.log_finish(&terminal);
                StreamOutcome::Finished(terminal)
            }
            None => self.cancelled(),
        }
    }

    fn cancelled(&self) -> StreamOutcome {
        info!(
            "Tutor stream #{} cancelled after {:?} ({} frames, {} bytes)",
            self.generation,
            self.stream_start.elapsed(),
            self.frame_count,
            self.bytes_received
        );
        StreamOutcome::Cancelled
    }

    fn log_finish(&self, state: &StreamState) {
        match &state.overall.error {
            Some(error) => warn!(
                "Tutor stream #{} failed after {:?}: {}",
                self.generation,
                self.stream_start.elapsed(),
                error
            ),
            None => info!(
                "Tutor stream #{} finished after {:?}, {} frames, {} bytes",
                self.generation,
                self.stream_start.elapsed(),
                self.frame_count,
                self.bytes_received
            ),
        }
    }
}
