//! Activity auditing.
//!
//! The lifecycle engine records one entry per successful state change. Recording is
//! best-effort: a failing sink is logged and counted but never fails the operation
//! that produced the entry.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::entities::activity_log::ActiveModel as ActivityLogActiveModel;
use crate::errors::ServiceError;
use crate::metrics::AUDIT_FAILURES;
use crate::models::Actor;

pub const SUBJECT_ORDER: &str = "order";

pub const ACTION_ORDER_CREATED: &str = "order_created";
pub const ACTION_ORDER_STATUS_UPDATED: &str = "order_status_updated";
pub const ACTION_PAYMENT_SUBMITTED: &str = "payment_submitted";
pub const ACTION_PAYMENT_APPROVED: &str = "payment_approved";
pub const ACTION_PAYMENT_REJECTED: &str = "payment_rejected";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub actor_id: Option<i32>,
    pub action: String,
    pub description: String,
    pub subject_type: Option<String>,
    pub subject_id: Option<i32>,
}

impl AuditEntry {
    pub fn for_order(actor: &Actor, action: &str, description: String, order_id: i32) -> Self {
        Self {
            actor_id: actor.user_id,
            action: action.to_string(),
            description,
            subject_type: Some(SUBJECT_ORDER.to_string()),
            subject_id: Some(order_id),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError>;
}

/// Records `entry`, swallowing any sink failure.
pub async fn record_best_effort(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action.clone();
    let subject_id = entry.subject_id;
    if let Err(e) = sink.record(entry).await {
        AUDIT_FAILURES.inc();
        warn!(
            action = %action,
            subject_id = ?subject_id,
            error = %e,
            "Failed to record audit entry; continuing"
        );
    }
}

/// Writes entries to the `activity_logs` table.
#[derive(Debug, Clone)]
pub struct ActivityLogSink {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogSink {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for ActivityLogSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError> {
        ActivityLogActiveModel {
            user_id: Set(entry.actor_id),
            action: Set(entry.action),
            subject_type: Set(entry.subject_type),
            subject_id: Set(entry.subject_id),
            description: Set(Some(entry.description)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to insert activity log: {}", e);
            ServiceError::DatabaseError(e)
        })?;
        Ok(())
    }
}

/// Keeps entries in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError> {
        debug!(action = %entry.action, "audit");
        self.entries
            .lock()
            .map_err(|_| ServiceError::InternalError("audit buffer poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
