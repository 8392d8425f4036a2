/// Approval notification relay
///
/// The engine publishes approval events here and forgets about them. Delivery
/// (badges, mail, websockets) belongs to whoever subscribes.

use crate::runtime::approval::{ApprovalRequest, ResolutionNotice};
use serde::Serialize;
use tokio::sync::broadcast;

/// Something happened to an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ApprovalEvent {
    /// A gated operation was deferred; approvers should be told.
    Filed(ApprovalRequest),
    /// A request was approved or dismissed; the requester should be told.
    Resolved(ResolutionNotice),
}

impl ApprovalEvent {
    pub fn request_id(&self) -> &str {
        match self {
            ApprovalEvent::Filed(request) => &request.id,
            ApprovalEvent::Resolved(notice) => &notice.request_id,
        }
    }
}

/// Sink for approval events. Publishing never fails the engine operation.
pub trait NotificationRelay: Send + Sync {
    fn publish(&self, event: ApprovalEvent);
}

/// Fan-out relay over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastRelay {
    sender: broadcast::Sender<ApprovalEvent>,
}

impl BroadcastRelay {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationRelay for BroadcastRelay {
    fn publish(&self, event: ApprovalEvent) {
        let request_id = event.request_id().to_string();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!("📣 Approval event for {} sent to {} subscriber(s)", request_id, receivers)
            }
            // No subscribers right now
            Err(_) => tracing::debug!("📭 Approval event for {} had no subscribers", request_id),
        }
    }
}
