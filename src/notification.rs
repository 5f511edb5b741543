//! Notification sink
//!
//! Delivery itself (email, push) lives outside this service. Like auditing,
//! notification failures are logged and never fail the calling operation.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SinkError;

#[derive(Debug, Serialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OfferSelected,
    OfferSubmitted,
    OfferExpiring,
    OfferExpired,
    ApplicationStatusChanged,
    ApplicationDeclined,
}

/// A message to a borrower or bank
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Send a notification, logging instead of propagating sink failures.
/// Returns whether the sink accepted it.
pub async fn send(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    notification_type: NotificationType,
    subject: impl Into<String>,
    body: impl Into<String>,
) -> bool {
    let notification = Notification {
        recipient_id,
        notification_type,
        subject: subject.into(),
        body: body.into(),
    };

    match sink.notify(notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                recipient_id = %recipient_id,
                notification_type = ?notification_type,
                error = %e,
                "Failed to send notification"
            );
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        tracing::info!(
            target: "notification",
            recipient_id = %notification.recipient_id,
            notification_type = ?notification.notification_type,
            subject = %notification.subject,
            "Notification queued"
        );
        Ok(())
    }
}

/// Queues notifications in the `notifications` table for an outbound worker
#[derive(Clone)]
pub struct PgNotificationSink {
    db_pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, notification_type, subject, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(notification.recipient_id)
        .bind(notification.notification_type)
        .bind(notification.subject)
        .bind(notification.body)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}
