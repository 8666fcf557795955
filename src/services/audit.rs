use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::BoardResult;
use crate::models::{AuditAction, AuditLogEntry, EntityType};
use crate::store::EntityStore;

/// Append-only audit trail. Writing never fails from the caller's point of
/// view; a lost entry is logged and dropped.
#[derive(Clone)]
pub struct AuditRecorder {
    store: EntityStore,
}

impl AuditRecorder {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: AuditLogEntry) {
        if let Err(err) = self.store.upsert(&entry).await {
            tracing::warn!(
                workspace_id = %entry.workspace_id,
                entity_id = %entry.entity_id,
                action = ?entry.action,
                error = %err,
                "failed to write audit log entry"
            );
        }
    }

    /// Entries for a workspace, newest first, at most `limit`.
    pub async fn list(&self, workspace_id: Uuid, limit: usize) -> BoardResult<Vec<AuditLogEntry>> {
        let mut entries = self.store.scan::<AuditLogEntry>(workspace_id).await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

pub fn entry(
    actor: &AuthenticatedUser,
    workspace_id: Uuid,
    action: AuditAction,
    entity_type: EntityType,
    entity_id: Uuid,
    entity_title: &str,
) -> AuditLogEntry {
    AuditLogEntry {
        id: Uuid::new_v4(),
        workspace_id,
        action,
        entity_id,
        entity_type,
        entity_title: entity_title.to_string(),
        actor_id: actor.user_id,
        actor_name: actor.display_name.clone(),
        created_at: Utc::now(),
    }
}
