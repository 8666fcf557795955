use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{BoardError, BoardResult};
use crate::models::{AuditLogEntry, Membership, Role, Workspace};
use crate::services::audit::AuditRecorder;
use crate::services::boards::{validate_text, TITLE_MAX};
use crate::services::cascade::{CascadeManager, CascadeReport};
use crate::services::guard::AccessGuard;
use crate::store::EntityStore;

const PERSONAL_SLUG: &str = "personal";

/// Namespace for personal workspace ids, which are derived from the owner's
/// user id so concurrent first requests converge on one workspace.
const PERSONAL_NAMESPACE: Uuid = Uuid::from_u128(0x6b61_6e62_616e_4000_8000_7065_7273_6f6e);

pub fn personal_workspace_id(user_id: Uuid) -> Uuid {
    Uuid::new_v5(&PERSONAL_NAMESPACE, user_id.as_bytes())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkspaceSummary {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: Role,
}

#[derive(Clone)]
pub struct WorkspaceService {
    store: EntityStore,
    guard: AccessGuard,
    cascade: CascadeManager,
    audit: AuditRecorder,
}

impl WorkspaceService {
    pub fn new(store: EntityStore) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            cascade: CascadeManager::new(store.clone()),
            audit: AuditRecorder::new(store.clone()),
            store,
        }
    }

    /// Returns the caller's personal workspace, creating it on first use.
    pub async fn ensure_personal_workspace(
        &self,
        actor: &AuthenticatedUser,
    ) -> BoardResult<Workspace> {
        let memberships = self.store.scan::<Membership>(actor.user_id).await?;
        if let Some(personal) = memberships.iter().find(|m| m.is_personal) {
            if let Some(workspace) = self
                .store
                .get::<Workspace>(personal.owner_id, personal.workspace_id)
                .await?
            {
                return Ok(workspace);
            }
            tracing::warn!(
                user_id = %actor.user_id,
                workspace_id = %personal.workspace_id,
                "personal membership without workspace; recreating"
            );
            if personal.workspace_id != personal_workspace_id(actor.user_id) {
                self.store.remove(personal).await?;
            }
        }

        let now = Utc::now();
        let workspace = Workspace {
            id: personal_workspace_id(actor.user_id),
            name: format!("{}'s workspace", actor.display_name),
            slug: PERSONAL_SLUG.to_string(),
            owner_id: actor.user_id,
            is_personal: true,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&workspace).await?;
        self.store
            .upsert(&owner_membership(actor, &workspace))
            .await?;
        tracing::info!(user_id = %actor.user_id, workspace_id = %workspace.id, "created personal workspace");
        Ok(workspace)
    }

    pub async fn create_workspace(
        &self,
        actor: &AuthenticatedUser,
        name: &str,
    ) -> BoardResult<Workspace> {
        let name = validate_text("name", name, 1, TITLE_MAX)?;
        let taken: HashSet<String> = self
            .store
            .scan::<Workspace>(actor.user_id)
            .await?
            .into_iter()
            .map(|workspace| workspace.slug)
            .collect();

        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            slug: unique_slug(&slugify(&name), &taken),
            name,
            owner_id: actor.user_id,
            is_personal: false,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&workspace).await?;
        self.store
            .upsert(&owner_membership(actor, &workspace))
            .await?;
        tracing::info!(workspace_id = %workspace.id, slug = %workspace.slug, "created workspace");
        Ok(workspace)
    }

    pub async fn list_workspaces(
        &self,
        actor: &AuthenticatedUser,
    ) -> BoardResult<Vec<WorkspaceSummary>> {
        let memberships = self.store.scan::<Membership>(actor.user_id).await?;
        let mut summaries = Vec::with_capacity(memberships.len());
        for membership in memberships {
            match self
                .store
                .get::<Workspace>(membership.owner_id, membership.workspace_id)
                .await?
            {
                Some(workspace) => summaries.push(WorkspaceSummary {
                    workspace,
                    role: membership.role,
                }),
                None => tracing::debug!(
                    workspace_id = %membership.workspace_id,
                    "skipping membership of missing workspace"
                ),
            }
        }
        summaries.sort_by(|a, b| {
            b.workspace
                .is_personal
                .cmp(&a.workspace.is_personal)
                .then_with(|| a.workspace.created_at.cmp(&b.workspace.created_at))
        });
        Ok(summaries)
    }

    pub async fn list_members(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
    ) -> BoardResult<Vec<Membership>> {
        self.guard.authorize(actor.user_id, workspace_id).await?;
        let mut members = self
            .store
            .find_by_field::<Membership>("workspace_id", &workspace_id.to_string())
            .await?;
        members.sort_by(|a, b| {
            b.is_owner()
                .cmp(&a.is_owner())
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(members)
    }

    /// Owners may remove members; members may remove themselves. The owner's
    /// own membership cannot be removed.
    pub async fn remove_member(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> BoardResult<()> {
        let caller = self.guard.authorize(actor.user_id, workspace_id).await?;
        if !caller.is_owner() && actor.user_id != user_id {
            return Err(BoardError::Unauthorized);
        }
        let Some(target) = self.store.get::<Membership>(user_id, workspace_id).await? else {
            return Err(BoardError::NotFound("membership"));
        };
        if target.is_owner() {
            return Err(BoardError::validation(
                "the workspace owner cannot be removed",
            ));
        }
        self.store.remove(&target).await?;
        tracing::info!(%workspace_id, %user_id, "removed workspace member");
        Ok(())
    }

    pub async fn delete_workspace(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
    ) -> BoardResult<CascadeReport> {
        let membership = self.guard.authorize_owner(actor.user_id, workspace_id).await?;
        let workspace = self
            .store
            .get::<Workspace>(membership.owner_id, workspace_id)
            .await?
            .ok_or(BoardError::NotFound("workspace"))?;
        if workspace.is_personal {
            return Err(BoardError::validation(
                "personal workspaces cannot be deleted",
            ));
        }
        let report = self.cascade.delete_workspace(&workspace).await?;
        tracing::info!(%workspace_id, boards = report.boards, "deleted workspace");
        Ok(report)
    }

    /// Newest entries first; any member may read the trail.
    pub async fn list_audit_log(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
        limit: usize,
    ) -> BoardResult<Vec<AuditLogEntry>> {
        self.guard.authorize(actor.user_id, workspace_id).await?;
        self.audit.list(workspace_id, limit).await
    }
}

fn owner_membership(actor: &AuthenticatedUser, workspace: &Workspace) -> Membership {
    Membership {
        user_id: actor.user_id,
        workspace_id: workspace.id,
        role: Role::Owner,
        is_personal: workspace.is_personal,
        owner_id: workspace.owner_id,
        display_name: Some(actor.display_name.clone()),
        created_at: workspace.created_at,
        updated_at: workspace.updated_at,
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "workspace".to_string()
    } else {
        slug
    }
}

fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|suffix| format!("{base}-{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4().simple()))
}
