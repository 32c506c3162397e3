//! Playback capability. The session runtime is handed an `AudioSink` instead
//! of touching an audio device directly, so headless runs and tests can swap
//! in the silent sink.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Plays decoded samples and reports completion. `play` must not block the
/// caller's thread; it resolves when playback finishes, or immediately when
/// the environment rejects playback. Playback failures are logged and
/// swallowed inside implementations; audio is a non-critical enhancement.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, samples: Vec<f32>, sample_rate: u32);

    /// Raised on playback start, lowered on completion or failure.
    fn is_playing(&self) -> watch::Receiver<bool>;
}

/// Sink for headless runs: consumes every clip instantly and never raises the
/// playing flag for longer than the call itself.
pub struct SilentSink {
    playing_tx: Arc<watch::Sender<bool>>,
}

impl SilentSink {
    pub fn new() -> Self {
        let (playing_tx, _) = watch::channel(false);
        Self {
            playing_tx: Arc::new(playing_tx),
        }
    }
}

impl Default for SilentSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for SilentSink {
    async fn play(&self, samples: Vec<f32>, sample_rate: u32) {
        tracing::debug!(
            "Muted playback of {} samples at {} Hz",
            samples.len(),
            sample_rate
        );
    }

    fn is_playing(&self) -> watch::Receiver<bool> {
        self.playing_tx.subscribe()
    }
}
