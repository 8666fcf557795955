use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// A record persisted in the table store, addressed by `(partition, row)`
/// where the partition is the owning parent's id.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    const KIND: &'static str;

    fn partition_key(&self) -> String;
    fn row_key(&self) -> String;
}

/// An item carrying a container-scoped `order`.
pub trait Ordered {
    fn id(&self) -> Uuid;
    fn container_id(&self) -> Uuid;
    fn set_container_id(&mut self, container_id: Uuid);
    fn order(&self) -> i32;
    fn set_order(&mut self, order: i32);
}

pub const ENTITY_TABLES: [&str; 7] = [
    Workspace::TABLE,
    Membership::TABLE,
    Board::TABLE,
    List::TABLE,
    Card::TABLE,
    Invitation::TABLE,
    AuditLogEntry::TABLE,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_id: Uuid,
    pub is_personal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Workspace {
    const TABLE: &'static str = "workspaces";
    const KIND: &'static str = "workspace";

    fn partition_key(&self) -> String {
        self.owner_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: Role,
    pub is_personal: bool,
    pub owner_id: Uuid,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

impl Entity for Membership {
    const TABLE: &'static str = "memberships";
    const KIND: &'static str = "membership";

    fn partition_key(&self) -> String {
        self.user_id.to_string()
    }

    fn row_key(&self) -> String {
        self.workspace_id.to_string()
    }
}

/// Cover image attached to a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BoardImage {
    pub id: String,
    pub thumb_url: String,
    pub full_url: String,
    pub link_html: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub image: Option<BoardImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Board {
    const TABLE: &'static str = "boards";
    const KIND: &'static str = "board";

    fn partition_key(&self) -> String {
        self.workspace_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for List {
    const TABLE: &'static str = "lists";
    const KIND: &'static str = "list";

    fn partition_key(&self) -> String {
        self.board_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

impl Ordered for List {
    fn id(&self) -> Uuid {
        self.id
    }

    fn container_id(&self) -> Uuid {
        self.board_id
    }

    fn set_container_id(&mut self, container_id: Uuid) {
        self.board_id = container_id;
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: Uuid,
    pub list_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Card {
    const TABLE: &'static str = "cards";
    const KIND: &'static str = "card";

    fn partition_key(&self) -> String {
        self.list_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

impl Ordered for Card {
    fn id(&self) -> Uuid {
        self.id
    }

    fn container_id(&self) -> Uuid {
        self.list_id
    }

    fn set_container_id(&mut self, container_id: Uuid) {
        self.list_id = container_id;
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only the SHA-256 digest of the redemption token is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl Entity for Invitation {
    const TABLE: &'static str = "invitations";
    const KIND: &'static str = "invitation";

    fn partition_key(&self) -> String {
        self.workspace_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Board,
    List,
    Card,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action: AuditAction,
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub entity_title: String,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for AuditLogEntry {
    const TABLE: &'static str = "audit_log";
    const KIND: &'static str = "audit log entry";

    fn partition_key(&self) -> String {
        self.workspace_id.to_string()
    }

    fn row_key(&self) -> String {
        self.id.to_string()
    }
}
