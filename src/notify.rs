use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

/// What the recipient needs to know about the invitation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvitationContext {
    pub workspace_id: Uuid,
    pub workspace_name: String,
    pub invited_by: String,
}

/// Delivers invitation links. Delivery is best effort: callers log a failed
/// send and carry on.
#[async_trait]
pub trait InvitationNotifier: Send + Sync + 'static {
    async fn send(&self, to: &str, link: &str, context: &InvitationContext) -> Result<()>;
}

/// Writes the invitation to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl InvitationNotifier for LogNotifier {
    async fn send(&self, to: &str, link: &str, context: &InvitationContext) -> Result<()> {
        tracing::info!(
            to,
            link,
            workspace_id = %context.workspace_id,
            invited_by = %context.invited_by,
            "invitation ready for delivery"
        );
        Ok(())
    }
}

/// POSTs the invitation as JSON to a delivery webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    link: &'a str,
    #[serde(flatten)]
    context: &'a InvitationContext,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl InvitationNotifier for WebhookNotifier {
    async fn send(&self, to: &str, link: &str, context: &InvitationContext) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&WebhookPayload { to, link, context })
            .send()
            .await
            .context("failed to reach invitation webhook")?
            .error_for_status()
            .context("invitation webhook rejected the request")?;
        Ok(())
    }
}
