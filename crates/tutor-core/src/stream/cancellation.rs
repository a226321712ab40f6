//! Cancellation support for tutor streams
//!
//! Allows a new stream, or an explicit reset, to stop the read loop of the
//! stream it supersedes.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for the live stream
#[derive(Debug, Clone)]
pub struct StreamCancellation {
    token: CancellationToken,
}

impl StreamCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token handed to a read loop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the current token and install a fresh one (for starting a new stream)
    pub fn renew(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
    }
}

impl Default for StreamCancellation {
    fn default() -> Self {
        Self::new()
    }
}
