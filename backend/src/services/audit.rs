use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One business event worth telling the outside world about
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: String,
    pub entity_id: String,
    pub summary: String,
    pub actor: Option<Uuid>,
    pub actor_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: &str, entity_id: impl ToString, summary: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            entity_id: entity_id.to_string(),
            summary: summary.into(),
            actor: None,
            actor_name: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attribute the event to the person who performed the operation
    pub fn by(mut self, actor: Uuid, actor_name: impl Into<String>) -> Self {
        self.actor = Some(actor);
        self.actor_name = Some(actor_name.into());
        self
    }
}

/// Publishes audit events to the log and, when configured, to an external
/// webhook. Delivery is fire-and-forget; a webhook outage never fails the
/// operation that produced the event.
#[derive(Clone)]
pub struct AuditSink {
    webhook_url: Option<String>,
    http_client: reqwest::Client,
}

impl AuditSink {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn publish(&self, event: AuditEvent) {
        tracing::info!(
            kind = %event.kind,
            entity_id = %event.entity_id,
            actor = ?event.actor,
            actor_name = ?event.actor_name,
            "{}",
            event.summary
        );

        if let Some(url) = self.webhook_url.clone() {
            let client = self.http_client.clone();
            tokio::spawn(async move {
                let result = client.post(&url).json(&event).send().await;
                match result {
                    Ok(response) if !response.status().is_success() => {
                        tracing::warn!(
                            status = %response.status(),
                            kind = %event.kind,
                            "audit webhook rejected event"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, kind = %event.kind, "audit webhook unreachable");
                    }
                    _ => {}
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_actor_id_and_name() {
        let actor = Uuid::new_v4();
        let event = AuditEvent::new("order.created", "PO-2024-0001", "Order created")
            .by(actor, "Pranee");

        assert_eq!(event.actor, Some(actor));
        assert_eq!(event.actor_name.as_deref(), Some("Pranee"));
    }

    #[test]
    fn unattributed_events_have_no_actor() {
        let event = AuditEvent::new("item.created", "SKU-1", "Item created");
        assert!(event.actor.is_none());
        assert!(event.actor_name.is_none());
    }
}
