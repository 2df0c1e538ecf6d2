use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::handler::VisitPhase;

/// Lifecycle event emitted by a dispatch execution.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    /// Execution this event belongs to.
    pub execution_id: Uuid,
    pub kind: ExecutionEventKind,
    pub published_at: DateTime<Utc>,
}

/// What happened.
#[derive(Debug, Clone)]
pub enum ExecutionEventKind {
    ExecutionStarted,
    ExecutionFinished,
    HandlerInvoked {
        phase: VisitPhase,
        selector: String,
        element: String,
        handler: String,
        outcome: InvocationOutcome,
    },
}

/// Result of a single handler invocation, as observed by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Success,
    Failure(String),
}

/// Broadcast publisher for execution lifecycle events.
///
/// Cloneable; all clones share the same channel. Publishing never blocks and
/// never fails: with no subscribers the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventPublisher {
    /// Create a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event for `execution_id`, stamping the publish time.
    pub fn publish(&self, execution_id: Uuid, kind: ExecutionEventKind) {
        let event = ExecutionEvent {
            execution_id,
            kind,
            published_at: Utc::now(),
        };
        // send() errors only when there are no subscribers, which is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
