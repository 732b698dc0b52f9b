//! Fetch state machine and the one-shot emission stream.
//!
//! Every repository operation runs the same arc: `Loading`, optionally a
//! `Success` built from the local cache, then a terminal `Success` or `Error`
//! from the network step. `ResourceStream` carries that arc to exactly one
//! subscriber; the sequence is cold (each repository call re-runs it from
//! scratch) and terminates when the emitter is dropped.

use tokio::sync::mpsc;

const EMISSION_BUFFER: usize = 8;

/// State of one logical fetch or mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<T> {
    /// Nothing attempted yet. Distinct from `Loading` so forms can tell
    /// "never submitted" apart from "in flight".
    Idle,
    Loading,
    Success(T),
    Error(String),
}

impl<T> ResourceState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Payload of a `Success`, if any.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResourceState<U> {
        match self {
            Self::Idle => ResourceState::Idle,
            Self::Loading => ResourceState::Loading,
            Self::Success(data) => ResourceState::Success(f(data)),
            Self::Error(message) => ResourceState::Error(message),
        }
    }
}

/// Sending half of a repository emission sequence.
pub struct ResourceEmitter<T> {
    tx: mpsc::Sender<ResourceState<T>>,
}

impl<T> ResourceEmitter<T> {
    /// Emit one state. Returns `false` once the subscriber is gone, at which
    /// point the producer should stop; in-flight network work is not aborted
    /// (cancellation is best effort).
    pub async fn emit(&self, state: ResourceState<T>) -> bool {
        self.tx.send(state).await.is_ok()
    }
}

/// Receiving half of a repository emission sequence.
pub struct ResourceStream<T> {
    rx: mpsc::Receiver<ResourceState<T>>,
}

impl<T> ResourceStream<T> {
    pub fn channel() -> (ResourceEmitter<T>, ResourceStream<T>) {
        let (tx, rx) = mpsc::channel(EMISSION_BUFFER);
        (ResourceEmitter { tx }, ResourceStream { rx })
    }

    /// Next state, or `None` once the sequence has terminated.
    pub async fn recv(&mut self) -> Option<ResourceState<T>> {
        self.rx.recv().await
    }

    /// Drain the whole sequence into a vec. Test and adapter convenience.
    pub async fn collect(mut self) -> Vec<ResourceState<T>> {
        let mut states = Vec::new();
        while let Some(state) = self.rx.recv().await {
            states.push(state);
        }
        states
    }
}
