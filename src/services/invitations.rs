use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{BoardError, BoardResult};
use crate::models::{Invitation, InvitationStatus, Membership, Role, Workspace};
use crate::notify::{InvitationContext, InvitationNotifier};
use crate::services::guard::AccessGuard;
use crate::store::EntityStore;

/// A freshly created invitation. `token` is only ever returned here.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvitation {
    pub invitation: Invitation,
    pub token: String,
}

#[derive(Clone)]
pub struct InvitationService {
    store: EntityStore,
    guard: AccessGuard,
    notifier: Arc<dyn InvitationNotifier>,
    ttl: Duration,
    link_base: String,
}

impl InvitationService {
    pub fn new(
        store: EntityStore,
        notifier: Arc<dyn InvitationNotifier>,
        ttl: Duration,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            store,
            notifier,
            ttl,
            link_base: link_base.into(),
        }
    }

    /// Owner-only; personal workspaces cannot be shared.
    pub async fn create_invitation(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
        email: &str,
    ) -> BoardResult<CreatedInvitation> {
        let membership = self.guard.authorize_owner(actor.user_id, workspace_id).await?;
        let workspace = self
            .store
            .get::<Workspace>(membership.owner_id, workspace_id)
            .await?
            .ok_or(BoardError::NotFound("workspace"))?;
        if workspace.is_personal {
            return Err(BoardError::validation(
                "personal workspaces cannot be shared",
            ));
        }
        let email = normalize_email(email)?;

        let now = Utc::now();
        let existing = self.refresh_expired(workspace_id).await?;
        if existing
            .iter()
            .any(|inv| inv.status == InvitationStatus::Pending && inv.email == email)
        {
            return Err(BoardError::invalid_field(
                "email",
                "an invitation for this email is already pending",
            ));
        }

        let token = generate_token();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            workspace_id,
            email,
            role: Role::Member,
            status: InvitationStatus::Pending,
            token_hash: hash_token(&token),
            invited_by: actor.user_id,
            expires_at: now + self.ttl,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&invitation).await?;
        tracing::info!(%workspace_id, invitation_id = %invitation.id, "created invitation");

        let context = InvitationContext {
            workspace_id,
            workspace_name: workspace.name.clone(),
            invited_by: actor.display_name.clone(),
        };
        let link = format!("{}/{token}", self.link_base.trim_end_matches('/'));
        if let Err(err) = self.notifier.send(&invitation.email, &link, &context).await {
            tracing::warn!(
                invitation_id = %invitation.id,
                error = %err,
                "failed to deliver invitation"
            );
        }

        Ok(CreatedInvitation { invitation, token })
    }

    /// Owner-only listing, newest first. Pending invitations past their
    /// expiry are marked expired as a side effect.
    pub async fn list_invitations(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
    ) -> BoardResult<Vec<Invitation>> {
        self.guard.authorize_owner(actor.user_id, workspace_id).await?;
        let mut invitations = self.refresh_expired(workspace_id).await?;
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    pub async fn accept_invitation(
        &self,
        actor: &AuthenticatedUser,
        token: &str,
    ) -> BoardResult<Membership> {
        let mut invitation = self.redeemable(actor, token).await?;

        let membership = match self
            .store
            .get::<Membership>(actor.user_id, invitation.workspace_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let workspace = self
                    .store
                    .get_by_row::<Workspace>(invitation.workspace_id)
                    .await?
                    .ok_or(BoardError::NotFound("workspace"))?;
                let now = Utc::now();
                let membership = Membership {
                    user_id: actor.user_id,
                    workspace_id: workspace.id,
                    role: invitation.role,
                    is_personal: false,
                    owner_id: workspace.owner_id,
                    display_name: Some(actor.display_name.clone()),
                    created_at: now,
                    updated_at: now,
                };
                self.store.upsert(&membership).await?;
                membership
            }
        };

        invitation.status = InvitationStatus::Accepted;
        invitation.updated_at = Utc::now();
        self.store.upsert(&invitation).await?;
        tracing::info!(
            invitation_id = %invitation.id,
            workspace_id = %invitation.workspace_id,
            user_id = %actor.user_id,
            "invitation accepted"
        );
        Ok(membership)
    }

    pub async fn reject_invitation(
        &self,
        actor: &AuthenticatedUser,
        token: &str,
    ) -> BoardResult<Invitation> {
        let mut invitation = self.redeemable(actor, token).await?;
        invitation.status = InvitationStatus::Rejected;
        invitation.updated_at = Utc::now();
        self.store.upsert(&invitation).await?;
        Ok(invitation)
    }

    /// Looks up a pending, unexpired invitation addressed to the caller.
    /// Callers other than the addressee learn nothing about its state. An
    /// expired pending invitation is transitioned to `expired` here.
    async fn redeemable(&self, actor: &AuthenticatedUser, token: &str) -> BoardResult<Invitation> {
        let mut invitation = self
            .store
            .find_by_field::<Invitation>("token_hash", &hash_token(token.trim()))
            .await?
            .into_iter()
            .next()
            .ok_or(BoardError::NotFound("invitation"))?;

        if !invitation.email.eq_ignore_ascii_case(actor.email.trim()) {
            return Err(BoardError::Unauthorized);
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(BoardError::InvitationClosed {
                status: invitation.status,
            });
        }
        let now = Utc::now();
        if invitation.is_past_expiry(now) {
            invitation.status = InvitationStatus::Expired;
            invitation.updated_at = now;
            self.store.upsert(&invitation).await?;
            tracing::info!(invitation_id = %invitation.id, "invitation expired");
            return Err(BoardError::InvitationClosed {
                status: InvitationStatus::Expired,
            });
        }
        Ok(invitation)
    }

    async fn refresh_expired(&self, workspace_id: Uuid) -> BoardResult<Vec<Invitation>> {
        let now = Utc::now();
        let mut invitations = self.store.scan::<Invitation>(workspace_id).await?;
        for invitation in invitations
            .iter_mut()
            .filter(|inv| inv.status == InvitationStatus::Pending && inv.is_past_expiry(now))
        {
            invitation.status = InvitationStatus::Expired;
            invitation.updated_at = now;
            self.store.upsert(&*invitation).await?;
        }
        Ok(invitations)
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn normalize_email(raw: &str) -> BoardResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(BoardError::invalid_field("email", "email address is invalid"));
    }
    Ok(email)
}
