use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::BoardResult;
use crate::models::{Card, List};
use crate::services::boards::{BoardService, BoardView, CardChanges};

/// A board edit proposed by the natural-language agent. The agent runs with
/// the caller's identity and gets no access the caller does not have.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentIntent {
    CreateCard {
        list_id: Uuid,
        title: String,
        #[serde(default)]
        description: Option<String>,
    },
    MoveCard {
        card_id: Uuid,
        list_id: Uuid,
        /// Defaults to the end of the destination list.
        #[serde(default)]
        index: Option<i64>,
    },
    UpdateCard {
        card_id: Uuid,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    CreateList {
        title: String,
    },
    RenameList {
        list_id: Uuid,
        title: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AppliedEntity {
    Card(Card),
    List(List),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntentOutcome {
    Applied { entity: AppliedEntity },
    Failed { error: String },
}

#[derive(Clone)]
pub struct AgentService {
    boards: BoardService,
}

impl AgentService {
    pub fn new(boards: BoardService) -> Self {
        Self { boards }
    }

    /// The board as the agent sees it before planning.
    pub async fn snapshot(&self, actor: &AuthenticatedUser, board_id: Uuid) -> BoardResult<BoardView> {
        self.boards.board_view(actor, board_id).await
    }

    /// Applies intents in order. A failing intent is reported and the rest
    /// still run.
    pub async fn apply_intents(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        intents: Vec<AgentIntent>,
    ) -> Vec<IntentOutcome> {
        let mut outcomes = Vec::with_capacity(intents.len());
        for intent in intents {
            let outcome = match self.apply(actor, board_id, intent).await {
                Ok(entity) => IntentOutcome::Applied { entity },
                Err(err) => {
                    tracing::debug!(%board_id, error = %err, "agent intent failed");
                    IntentOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn apply(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        intent: AgentIntent,
    ) -> BoardResult<AppliedEntity> {
        match intent {
            AgentIntent::CreateCard {
                list_id,
                title,
                description,
            } => self
                .boards
                .create_card(actor, board_id, list_id, &title, description.as_deref(), None)
                .await
                .map(AppliedEntity::Card),
            AgentIntent::MoveCard {
                card_id,
                list_id,
                index,
            } => self
                .boards
                .move_card(actor, board_id, card_id, None, list_id, index.unwrap_or(i64::MAX))
                .await
                .map(|moved| AppliedEntity::Card(moved.card)),
            AgentIntent::UpdateCard {
                card_id,
                title,
                description,
            } => self
                .boards
                .update_card(actor, board_id, card_id, CardChanges { title, description })
                .await
                .map(AppliedEntity::Card),
            AgentIntent::CreateList { title } => self
                .boards
                .create_list(actor, board_id, &title)
                .await
                .map(AppliedEntity::List),
            AgentIntent::RenameList { list_id, title } => self
                .boards
                .rename_list(actor, board_id, list_id, &title)
                .await
                .map(AppliedEntity::List),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::models::{Membership, Role};
    use crate::store::EntityStore;

    #[test]
    fn intents_parse_from_tagged_json() -> serde_json::Result<()> {
        let list_id = Uuid::new_v4();
        let intent: AgentIntent = serde_json::from_value(json!({
            "action": "create_card",
            "list_id": list_id,
            "title": "Write docs"
        }))?;
        assert_eq!(
            intent,
            AgentIntent::CreateCard {
                list_id,
                title: "Write docs".to_string(),
                description: None
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_intents() -> anyhow::Result<()> {
        let store = EntityStore::in_memory();
        let actor = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };
        let workspace_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .upsert(&Membership {
                user_id: actor.user_id,
                workspace_id,
                role: Role::Owner,
                is_personal: false,
                owner_id: actor.user_id,
                display_name: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        let boards = BoardService::new(store.clone());
        let board = boards.create_board(&actor, workspace_id, "Roadmap", None).await?;
        let list = boards.create_list(&actor, board.id, "Todo").await?;
        let agent = AgentService::new(boards);

        let outcomes = agent
            .apply_intents(
                &actor,
                board.id,
                vec![
                    AgentIntent::CreateCard {
                        list_id: Uuid::new_v4(),
                        title: "lost".to_string(),
                        description: None,
                    },
                    AgentIntent::CreateCard {
                        list_id: list.id,
                        title: "kept".to_string(),
                        description: None,
                    },
                    AgentIntent::RenameList {
                        list_id: list.id,
                        title: "Doing".to_string(),
                    },
                ],
            )
            .await;
        assert!(matches!(outcomes[0], IntentOutcome::Failed { .. }));
        assert!(matches!(
            &outcomes[1],
            IntentOutcome::Applied { entity: AppliedEntity::Card(card) } if card.title == "kept"
        ));

        let view = agent.snapshot(&actor, board.id).await?;
        assert_eq!(view.lists[0].list.title, "Doing");
        assert_eq!(view.lists[0].cards.len(), 1);
        Ok(())
    }
}
