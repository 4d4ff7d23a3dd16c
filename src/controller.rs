//! Consumer-side request lifecycle: one summary at a time, newest wins.

use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use crate::models::GenerationRequest;
use crate::stream::{
    Accumulator, ByteStream, FrameDecoder, GenerationError, StreamError, Transport, WireFrame,
};

// ============================================================================
// CANCELLATION TOKEN
// ============================================================================

#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Requesting,
    Streaming {
        partial: String,
    },
    Succeeded {
        text: String,
    },
    Failed {
        error: GenerationError,
        partial: String,
    },
    Cancelled {
        partial: String,
    },
}

impl LifecycleState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming { .. })
    }

    /// Text to render for this state. Empty before the first chunk.
    pub fn text(&self) -> &str {
        match self {
            Self::Idle | Self::Requesting => "",
            Self::Streaming { partial }
            | Self::Failed { partial, .. }
            | Self::Cancelled { partial } => partial,
            Self::Succeeded { text } => text,
        }
    }

    pub fn error(&self) -> Option<&GenerationError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What subscribers see. `epoch` changes on every `generate` and `cancel`,
/// and a run may only publish while the epoch is still its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub epoch: u64,
    pub state: LifecycleState,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct LifecycleController {
    transport: Arc<dyn Transport>,
    state: Arc<watch::Sender<Snapshot>>,
    active: Mutex<Option<CancellationToken>>,
    idle_timeout: Option<Duration>,
}

impl LifecycleController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Arc::new(watch::Sender::new(Snapshot::default())),
            active: Mutex::new(None),
            idle_timeout: None,
        }
    }

    /// Fails the run when no bytes arrive for `limit`.
    pub fn with_idle_timeout(mut self, limit: Duration) -> Self {
        self.idle_timeout = Some(limit);
        self
    }

    /// Starts a summary, superseding whatever is in flight, and returns the
    /// new epoch. Must be called inside a Tokio runtime.
    pub fn generate(&self, request: GenerationRequest) -> u64 {
        self.detach();

        if let Err(err) = request.validate() {
            log::warn!("⚠️  Rejected summary request: {}", err.message);
            return self.replace(LifecycleState::Failed {
                error: err.into(),
                partial: String::new(),
            });
        }

        let epoch = self.replace(LifecycleState::Requesting);
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        log::debug!("📝 Summary run {} started ({})", epoch, request.style);

        let run = Run {
            epoch,
            state: self.state.clone(),
            transport: self.transport.clone(),
            idle_timeout: self.idle_timeout,
        };
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::debug!("🛑 Summary run {} detached", epoch);
                }
                _ = run.execute(request) => {}
            }
        });

        epoch
    }

    /// Stops reacting to the active run. Loading states become `Cancelled`,
    /// settled states are left alone.
    pub fn cancel(&self) {
        self.detach();
        self.state.send_if_modified(|snap| {
            if !snap.state.is_loading() {
                return false;
            }
            snap.epoch += 1;
            snap.state = LifecycleState::Cancelled {
                partial: snap.state.text().to_string(),
            };
            true
        });
    }

    pub fn current_state(&self) -> LifecycleState {
        self.state.borrow().state.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn completion(&self) -> String {
        self.state.borrow().state.text().to_string()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().state.is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Waits until the current run is no longer loading.
    pub async fn wait_until_settled(&self) -> LifecycleState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|snap| !snap.state.is_loading()).await {
            Ok(snap) => snap.state.clone(),
            Err(_) => self.current_state(),
        }
    }

    fn detach(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = previous {
            token.cancel();
        }
    }

    fn replace(&self, state: LifecycleState) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|snap| {
            snap.epoch += 1;
            snap.state = state;
            epoch = snap.epoch;
        });
        epoch
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.detach();
    }
}

// ============================================================================
// RUN
// ============================================================================

enum Outcome {
    Done(String),
    Failed(GenerationError, String),
    Superseded,
}

struct Run {
    epoch: u64,
    state: Arc<watch::Sender<Snapshot>>,
    transport: Arc<dyn Transport>,
    idle_timeout: Option<Duration>,
}

impl Run {
    async fn execute(self, request: GenerationRequest) {
        let (state, chunks) = match self.drive(&request).await {
            (Outcome::Done(text), chunks) => (LifecycleState::Succeeded { text }, chunks),
            (Outcome::Failed(error, partial), chunks) => {
                log::warn!("❌ Summary run {} failed: {}", self.epoch, error);
                (LifecycleState::Failed { error, partial }, chunks)
            }
            (Outcome::Superseded, _) => return,
        };
        if self.publish(state) {
            log::debug!("✅ Summary run {} settled after {} chunks", self.epoch, chunks);
        }
    }

    async fn drive(&self, request: &GenerationRequest) -> (Outcome, usize) {
        let mut stream = match self.transport.open(request).await {
            Ok(stream) => stream,
            Err(e) => return (Outcome::Failed(e, String::new()), 0),
        };

        let mut decoder = FrameDecoder::new();
        let mut acc = Accumulator::new();

        let outcome = loop {
            let bytes = match self.next_bytes(&mut stream).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    break match decoder.finish() {
                        Ok(()) => Outcome::Done(acc.text().to_string()),
                        Err(e) => Outcome::Failed(e.into(), acc.text().to_string()),
                    };
                }
                Err(e) => break Outcome::Failed(e.into(), acc.text().to_string()),
            };

            if let Err(e) = decoder.feed(&bytes) {
                break Outcome::Failed(e.into(), acc.text().to_string());
            }

            match self.apply_frames(&mut decoder, &mut acc) {
                Some(outcome) => break outcome,
                None => continue,
            }
        };

        (outcome, acc.chunks())
    }

    /// Applies every complete frame. `Some` ends the run.
    fn apply_frames(&self, decoder: &mut FrameDecoder, acc: &mut Accumulator) -> Option<Outcome> {
        loop {
            match decoder.next_frame() {
                Ok(None) => return None,
                Ok(Some(WireFrame::TextDelta(delta))) => {
                    let partial = acc.append(&delta).to_string();
                    if !self.publish(LifecycleState::Streaming { partial }) {
                        return Some(Outcome::Superseded);
                    }
                }
                Ok(Some(WireFrame::Error(details))) => {
                    return Some(Outcome::Failed(
                        GenerationError::Backend(details),
                        acc.text().to_string(),
                    ));
                }
                Err(e) => return Some(Outcome::Failed(e.into(), acc.text().to_string())),
            }
        }
    }

    async fn next_bytes(
        &self,
        stream: &mut ByteStream,
    ) -> Result<Option<bytes::Bytes>, StreamError> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| StreamError::Timeout(limit))?,
            None => stream.next().await,
        };
        next.transpose()
    }

    /// Publishes only while this run still owns the epoch.
    fn publish(&self, state: LifecycleState) -> bool {
        self.state.send_if_modified(|snap| {
            if snap.epoch != self.epoch {
                return false;
            }
            snap.state = state;
            true
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
