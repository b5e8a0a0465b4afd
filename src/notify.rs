use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A participant-count change on one group, broadcast to dashboard
/// observers.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantUpdate {
    /// The group whose live session changed.
    pub group_id: Uuid,
    /// The number of active participants after the change.
    pub participant_count: usize,
    /// The active participants after the change.
    pub participants: Vec<String>,
}

/// Fire-and-forget fan-out of participant changes.
///
/// Delivery is best-effort: a send with no subscribers (or a lagging
/// subscriber) is logged and dropped, never surfaced to the request that
/// triggered it.
#[derive(Clone)]
pub struct ParticipantNotifier {
    tx: broadcast::Sender<ParticipantUpdate>,
}

impl ParticipantNotifier {
    /// Creates a notifier with the given broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes a new observer (used by the SSE endpoint).
    pub fn subscribe(&self) -> broadcast::Receiver<ParticipantUpdate> {
        self.tx.subscribe()
    }

    /// Broadcasts the post-change participant set for a group.
    pub fn participant_change(&self, group_id: Uuid, participants: &[String]) {
        let update = ParticipantUpdate {
            group_id,
            participant_count: participants.len(),
            participants: participants.to_vec(),
        };

        match self.tx.send(update) {
            Ok(observers) => {
                tracing::debug!(
                    "📢 Participant change on group {} broadcast to {} observers",
                    group_id,
                    observers
                );
            }
            Err(_) => {
                tracing::debug!(
                    "No observers for participant change on group {}",
                    group_id
                );
            }
        }
    }
}
