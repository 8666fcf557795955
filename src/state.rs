use std::sync::Arc;

use chrono::Duration;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    notify::InvitationNotifier,
    services::{
        agent::AgentService, boards::BoardService, guard::AccessGuard,
        invitations::InvitationService, workspaces::WorkspaceService,
    },
    store::EntityStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub config: Arc<AppConfig>,
    pub notifier: Arc<dyn InvitationNotifier>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        store: EntityStore,
        config: AppConfig,
        notifier: Arc<dyn InvitationNotifier>,
        jwt: JwtService,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            notifier,
            jwt,
        }
    }

    pub fn boards(&self) -> BoardService {
        BoardService::new(self.store.clone())
    }

    pub fn workspaces(&self) -> WorkspaceService {
        WorkspaceService::new(self.store.clone())
    }

    pub fn invitations(&self) -> InvitationService {
        InvitationService::new(
            self.store.clone(),
            self.notifier.clone(),
            Duration::hours(self.config.invitation_ttl_hours),
            self.config.invitation_base_url.clone(),
        )
    }

    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(self.store.clone())
    }

    pub fn agent(&self) -> AgentService {
        AgentService::new(self.boards())
    }
}
