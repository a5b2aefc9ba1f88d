//! Abort flags
//!
//! Each stage owns one abort flag. Downstream stages raise it to ask the
//! stage to stop producing. Raising is non-blocking and coalesced.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One-shot, coalesced stop request
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag
    ///
    /// Returns `false` when the flag was already raised, in which case
    /// nothing happens.
    pub fn request(&self) -> bool {
        if self.token.is_cancelled() {
            debug!("Abort already pending, not re-sending");
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag is raised
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Sends `item` unless the flag is raised first
    ///
    /// Returns `false` when the item was not delivered, either because of an
    /// abort or because the receiving side is gone. A raised flag always wins
    /// over a ready channel, so nothing is sent after an abort was observed.
    pub async fn send<T>(&self, output: &mpsc::Sender<T>, item: T) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = output.send(item) => sent.is_ok(),
        }
    }
}
