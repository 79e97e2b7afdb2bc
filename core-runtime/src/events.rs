//! # Event Bus System
//!
//! Typed events from the reconciliation core to whoever renders progress,
//! over a `tokio::sync::broadcast` channel. The orchestrator never touches UI
//! state directly; a host subscribes and updates its file list from these.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Batch(BatchEvent::Started {
//!         run_id: "run-1".to_string(),
//!         mode: "auto_complete".to_string(),
//!         total_files: 3,
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Batch started");
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Batch Events
//! - `Started`: a run was accepted by the coordinator
//! - `Progress`: one more file reached a terminal state
//! - `Completed`: every file was visited
//! - `Cancelled`: the run stopped at a file boundary
//!
//! ### File Events
//! - `StateChanged`: per-file state machine transition
//! - `Outcome`: terminal result for one file
//! - `FormatCorrected`: the writer fell back to a different container
//! - `Renamed`: post-write rename succeeded
//! - `LyricSaved`: lyric sidecar written
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber fell behind and missed `n` events.
//! - **`RecvError::Closed`**: every sender was dropped.
//!
//! `emit` fails only when nobody is subscribed, which producers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Whole-run lifecycle
    Batch(BatchEvent),
    /// Single-file progress and results
    File(FileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Batch(e) => e.description(),
            CoreEvent::File(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::File(FileEvent::Outcome { status, .. }) if status == "failed" => {
                EventSeverity::Error
            }
            CoreEvent::File(FileEvent::FormatCorrected { .. }) => EventSeverity::Warning,
            CoreEvent::Batch(BatchEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::File(FileEvent::Outcome { .. }) => EventSeverity::Info,
            CoreEvent::Batch(BatchEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Run this event belongs to, if it was produced inside a batch.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Batch(e) => Some(e.run_id()),
            CoreEvent::File(FileEvent::StateChanged { run_id, .. })
            | CoreEvent::File(FileEvent::Outcome { run_id, .. }) => run_id.as_deref(),
            CoreEvent::File(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Batch Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BatchEvent {
    Started {
        run_id: String,
        /// `auto_complete` or `edit`
        mode: String,
        total_files: u64,
    },
    Progress {
        run_id: String,
        processed: u64,
        total: u64,
        /// 0-100
        percent: u8,
        current_path: String,
    },
    Completed {
        run_id: String,
        applied: u64,
        skipped: u64,
        failed: u64,
        duration_ms: u64,
    },
    Cancelled {
        run_id: String,
        /// Files that reached a terminal state before the run stopped
        processed: u64,
    },
}

impl BatchEvent {
    fn description(&self) -> &str {
        match self {
            BatchEvent::Started { .. } => "Batch started",
            BatchEvent::Progress { .. } => "Batch in progress",
            BatchEvent::Completed { .. } => "Batch completed",
            BatchEvent::Cancelled { .. } => "Batch cancelled",
        }
    }

    fn run_id(&self) -> &str {
        match self {
            BatchEvent::Started { run_id, .. }
            | BatchEvent::Progress { run_id, .. }
            | BatchEvent::Completed { run_id, .. }
            | BatchEvent::Cancelled { run_id, .. } => run_id,
        }
    }
}

// ============================================================================
// File Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FileEvent {
    StateChanged {
        run_id: Option<String>,
        path: String,
        state: String,
    },
    Outcome {
        run_id: Option<String>,
        path: String,
        /// `applied`, `skipped` or `failed`
        status: String,
        score: Option<u8>,
        /// Error text, verbatim, when the file failed or was skipped
        message: Option<String>,
    },
    FormatCorrected {
        path: String,
        detected: String,
        original_extension: String,
    },
    Renamed {
        from: String,
        to: String,
    },
    LyricSaved {
        path: String,
        sidecar: String,
    },
}

impl FileEvent {
    fn description(&self) -> &str {
        match self {
            FileEvent::StateChanged { .. } => "File state changed",
            FileEvent::Outcome { .. } => "File processed",
            FileEvent::FormatCorrected { .. } => "Container differs from extension",
            FileEvent::Renamed { .. } => "File renamed",
            FileEvent::LyricSaved { .. } => "Lyric sidecar saved",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let run_events = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.run_id() == Some("run-1"));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match the predicate will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
