//! Audit trail sink
//!
//! Audit writes are fire-and-forget: a failing sink is logged and never aborts
//! the business operation that produced the entry.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::SinkError;

/// Audited action codes
#[derive(Debug, Serialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RateCardCreated,
    RateCardUpdated,
    OfferCalculated,
    OfferSubmitted,
    OfferResubmitted,
    OfferSelected,
    OfferWithdrawn,
    OfferExpired,
    ApplicationStatusChanged,
    ApplicationDeclined,
    ApplicationAutoReverted,
}

/// One audit record
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AuditEntry {
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl AuditEntry {
    pub fn new(entity_type: &'static str, entity_id: Uuid, action: AuditAction) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            old_values: None,
            new_values: None,
        }
    }

    pub fn with_old(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn with_new(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// JSON snapshot of an entity for the old/new value columns
pub fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), SinkError>;
}

/// Record an entry, logging instead of propagating sink failures
pub async fn record(sink: &dyn AuditSink, entry: AuditEntry) {
    let entity_id = entry.entity_id;
    let action = entry.action;
    if let Err(e) = sink.log_action(entry).await {
        tracing::warn!(
            entity_id = %entity_id,
            action = ?action,
            error = %e,
            "Failed to write audit entry"
        );
    }
}

/// Writes audit entries to the log only
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), SinkError> {
        tracing::info!(
            target: "audit",
            entity_type = entry.entity_type,
            entity_id = %entry.entity_id,
            action = ?entry.action,
            old_values = ?entry.old_values,
            new_values = ?entry.new_values,
            "Audit"
        );
        Ok(())
    }
}

/// Persists audit entries to the `audit_logs` table
#[derive(Clone)]
pub struct PgAuditSink {
    db_pool: PgPool,
}

impl PgAuditSink {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (entity_type, entity_id, action, old_values, new_values)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.action)
        .bind(entry.old_values)
        .bind(entry.new_values)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}
