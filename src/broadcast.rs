//! Fan-out of one chat message to everyone but its author

use crate::protocol::ChatMessage;
use crate::state::registry::Registry;
use crate::ws::outbound::DeliveryError;

/// Who a broadcast reached and who it missed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, DeliveryError)>,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send `message` to every registered participant except `exclude`.
///
/// The message is encoded once and the same frame is queued for each
/// recipient. A recipient whose queue is full or closed is logged and
/// skipped; the rest still get the message.
pub async fn broadcast(
    registry: &Registry,
    message: &ChatMessage,
    exclude: &str,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    let frame = match message.encode() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode broadcast message");
            return report;
        }
    };

    for (name, outbound) in registry.snapshot_except(exclude).await {
        match outbound.send_text(frame.clone()) {
            Ok(()) => report.delivered.push(name),
            Err(e) => {
                tracing::warn!(recipient = %name, error = %e, "Failed to deliver message");
                report.failed.push((name, e));
            }
        }
    }

    tracing::debug!(
        from = %message.user_name,
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Broadcast complete"
    );

    report
}
