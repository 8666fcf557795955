use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{BoardError, BoardResult};
use crate::models::{AuditAction, Board, BoardImage, Card, Entity, EntityType, List, Ordered};
use crate::services::audit::{self, AuditRecorder};
use crate::services::cascade::CascadeManager;
use crate::services::guard::AccessGuard;
use crate::services::ordering;
use crate::store::EntityStore;

pub const BOARD_TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 5000;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListWithCards {
    #[serde(flatten)]
    pub list: List,
    pub cards: Vec<Card>,
}

/// Snapshot of a board with its lists and cards in display order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardView {
    pub board: Board,
    pub lists: Vec<ListWithCards>,
}

#[derive(Debug, Clone, Default)]
pub struct CardChanges {
    pub title: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
}

/// Both sides of a card move after re-indexing. `source` and `destination`
/// are the same list for a move within one list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CardMove {
    pub card: Card,
    pub source: Vec<Card>,
    pub destination: Vec<Card>,
}

#[derive(Clone)]
pub struct BoardService {
    store: EntityStore,
    guard: AccessGuard,
    cascade: CascadeManager,
    audit: AuditRecorder,
}

impl BoardService {
    pub fn new(store: EntityStore) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            cascade: CascadeManager::new(store.clone()),
            audit: AuditRecorder::new(store.clone()),
            store,
        }
    }

    pub async fn create_board(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
        title: &str,
        image: Option<BoardImage>,
    ) -> BoardResult<Board> {
        self.guard.authorize(actor.user_id, workspace_id).await?;
        let title = validate_text("title", title, BOARD_TITLE_MIN, TITLE_MAX)?;

        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            workspace_id,
            title,
            image,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&board).await?;
        tracing::info!(board_id = %board.id, %workspace_id, "created board");
        self.audit
            .record(audit::entry(
                actor,
                workspace_id,
                AuditAction::Create,
                EntityType::Board,
                board.id,
                &board.title,
            ))
            .await;
        Ok(board)
    }

    pub async fn list_boards(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
    ) -> BoardResult<Vec<Board>> {
        self.guard.authorize(actor.user_id, workspace_id).await?;
        let mut boards = self.store.scan::<Board>(workspace_id).await?;
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    pub async fn board_view(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
    ) -> BoardResult<BoardView> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let mut lists = self.store.scan::<List>(board.id).await?;
        ordering::sort_by_order(&mut lists);

        let mut views = Vec::with_capacity(lists.len());
        for list in lists {
            let mut cards = self.current_cards(list.id).await?;
            ordering::sort_by_order(&mut cards);
            views.push(ListWithCards { list, cards });
        }
        Ok(BoardView {
            board,
            lists: views,
        })
    }

    pub async fn rename_board(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        title: &str,
    ) -> BoardResult<Board> {
        let (_, mut board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let title = validate_text("title", title, BOARD_TITLE_MIN, TITLE_MAX)?;
        board.title = title;
        board.updated_at = Utc::now();
        self.store.upsert(&board).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Update,
                EntityType::Board,
                board.id,
                &board.title,
            ))
            .await;
        Ok(board)
    }

    /// Deletes a board and everything on it. Deleting a board that is
    /// already gone succeeds.
    pub async fn delete_board(
        &self,
        actor: &AuthenticatedUser,
        workspace_id: Uuid,
        board_id: Uuid,
    ) -> BoardResult<()> {
        self.guard.authorize(actor.user_id, workspace_id).await?;
        let Some(board) = self.store.get::<Board>(workspace_id, board_id).await? else {
            return Ok(());
        };
        self.cascade.delete_board(&board).await?;
        self.audit
            .record(audit::entry(
                actor,
                workspace_id,
                AuditAction::Delete,
                EntityType::Board,
                board.id,
                &board.title,
            ))
            .await;
        Ok(())
    }

    pub async fn create_list(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        title: &str,
    ) -> BoardResult<List> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let title = validate_text("title", title, 1, TITLE_MAX)?;
        let siblings = self.store.scan::<List>(board.id).await?;

        let now = Utc::now();
        let list = List {
            id: Uuid::new_v4(),
            board_id: board.id,
            title,
            order: ordering::next_order(&siblings),
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&list).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Create,
                EntityType::List,
                list.id,
                &list.title,
            ))
            .await;
        Ok(list)
    }

    pub async fn rename_list(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        list_id: Uuid,
        title: &str,
    ) -> BoardResult<List> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let title = validate_text("title", title, 1, TITLE_MAX)?;
        let mut list = self.guard.list_in_board(&board, list_id).await?;
        list.title = title;
        list.updated_at = Utc::now();
        self.store.upsert(&list).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Update,
                EntityType::List,
                list.id,
                &list.title,
            ))
            .await;
        Ok(list)
    }

    /// Deletes a list with its cards and closes the gap among the remaining
    /// lists.
    pub async fn delete_list(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        list_id: Uuid,
    ) -> BoardResult<Vec<List>> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let list = self.guard.list_in_board(&board, list_id).await?;
        self.cascade.delete_list(&list).await?;

        let remaining = self.store.scan::<List>(board.id).await?;
        let remaining = self.resequence(remaining).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Delete,
                EntityType::List,
                list.id,
                &list.title,
            ))
            .await;
        Ok(remaining)
    }

    pub async fn reorder_lists(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> BoardResult<Vec<List>> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let lists = self.store.scan::<List>(board.id).await?;
        let before = ordering::positions(&lists);
        let reordered = ordering::reorder_within(lists, ordered_ids)?;
        self.persist_changed(&before, &reordered).await?;
        tracing::debug!(board_id = %board.id, count = reordered.len(), "reordered lists");
        Ok(reordered)
    }

    /// Appends a card to the list, or places it right after `after_card_id`.
    pub async fn create_card(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        list_id: Uuid,
        title: &str,
        description: Option<&str>,
        after_card_id: Option<Uuid>,
    ) -> BoardResult<Card> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let title = validate_text("title", title, 1, TITLE_MAX)?;
        let description = validate_description(description)?;
        let list = self.guard.list_in_board(&board, list_id).await?;
        let siblings = self.current_cards(list.id).await?;

        let now = Utc::now();
        let mut card = Card {
            id: Uuid::new_v4(),
            list_id: list.id,
            title,
            description,
            order: ordering::next_order(&siblings),
            created_at: now,
            updated_at: now,
        };

        match after_card_id {
            None => self.store.upsert(&card).await?,
            Some(predecessor) => {
                let before = ordering::positions(&siblings);
                let sequence = ordering::insert_after(siblings, card.clone(), predecessor)?;
                if let Some(placed) = sequence.iter().find(|c| c.id == card.id) {
                    card.order = placed.order;
                }
                self.persist_changed(&before, &sequence).await?;
            }
        }

        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Create,
                EntityType::Card,
                card.id,
                &card.title,
            ))
            .await;
        Ok(card)
    }

    pub async fn update_card(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        card_id: Uuid,
        changes: CardChanges,
    ) -> BoardResult<Card> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let title = changes
            .title
            .as_deref()
            .map(|title| validate_text("title", title, 1, TITLE_MAX))
            .transpose()?;
        let description = changes
            .description
            .as_deref()
            .map(|description| validate_description(Some(description)))
            .transpose()?;
        let (_, mut card) = self.guard.card_in_board(&board, card_id).await?;
        if let Some(title) = title {
            card.title = title;
        }
        if let Some(description) = description {
            card.description = description;
        }
        card.updated_at = Utc::now();
        self.store.upsert(&card).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Update,
                EntityType::Card,
                card.id,
                &card.title,
            ))
            .await;
        Ok(card)
    }

    pub async fn delete_card(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        card_id: Uuid,
    ) -> BoardResult<Vec<Card>> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let (list, card) = self.guard.card_in_board(&board, card_id).await?;
        self.store.remove(&card).await?;

        let remaining = self.current_cards(list.id).await?;
        let remaining = self.resequence(remaining).await?;
        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Delete,
                EntityType::Card,
                card.id,
                &card.title,
            ))
            .await;
        Ok(remaining)
    }

    pub async fn reorder_cards(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        list_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> BoardResult<Vec<Card>> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let list = self.guard.list_in_board(&board, list_id).await?;
        let cards = self.current_cards(list.id).await?;
        let before = ordering::positions(&cards);
        let reordered = ordering::reorder_within(cards, ordered_ids)?;
        self.persist_changed(&before, &reordered).await?;
        Ok(reordered)
    }

    /// Moves a card to `index` in `destination_list_id`, within its list or
    /// across lists of the same board. When `source_list_id` is given it must
    /// be the card's current list.
    ///
    /// A cross-list move writes the destination first, then removes the
    /// source row and re-indexes the source. A failure between the steps
    /// leaves the card live in the destination and a stale row in the
    /// source, which the next read of the source list sweeps.
    pub async fn move_card(
        &self,
        actor: &AuthenticatedUser,
        board_id: Uuid,
        card_id: Uuid,
        source_list_id: Option<Uuid>,
        destination_list_id: Uuid,
        index: i64,
    ) -> BoardResult<CardMove> {
        let (_, board) = self.guard.authorize_board(actor.user_id, board_id).await?;
        let (source_list, card) = self.guard.card_in_board(&board, card_id).await?;
        if source_list_id.is_some_and(|claimed| claimed != source_list.id) {
            return Err(BoardError::containment(
                "card does not belong to the stated source list",
            ));
        }
        let destination_list = self.guard.list_in_board(&board, destination_list_id).await?;

        let source_cards = self.current_cards(source_list.id).await?;
        let outcome = if source_list.id == destination_list.id {
            let before = ordering::positions(&source_cards);
            let mut sequence = ordering::move_within(source_cards, card.id, index)?;
            if let Some(moved) = sequence
                .iter_mut()
                .find(|c| c.id == card.id && c.order != card.order)
            {
                moved.updated_at = Utc::now();
            }
            self.persist_changed(&before, &sequence).await?;
            let moved = sequence
                .iter()
                .find(|c| c.id == card.id)
                .cloned()
                .ok_or(BoardError::NotFound("card"))?;
            CardMove {
                card: moved,
                source: sequence.clone(),
                destination: sequence,
            }
        } else {
            let destination_cards = self.current_cards(destination_list.id).await?;
            let mut before = ordering::positions(&source_cards);
            before.extend(ordering::positions(&destination_cards));
            let mut plan = ordering::move_across(
                source_cards,
                destination_cards,
                destination_list.id,
                card.id,
                index,
            )?;
            let now = Utc::now();
            plan.moved.updated_at = now;
            if let Some(moved) = plan.destination.iter_mut().find(|c| c.id == card.id) {
                moved.updated_at = now;
            }

            self.persist_changed(&before, &plan.destination).await?;
            self.store.delete::<Card>(source_list.id, card.id).await?;
            self.persist_changed(&before, &plan.source).await?;
            tracing::debug!(
                card_id = %card.id,
                from = %source_list.id,
                to = %destination_list.id,
                "moved card across lists"
            );
            CardMove {
                card: plan.moved,
                source: plan.source,
                destination: plan.destination,
            }
        };

        self.audit
            .record(audit::entry(
                actor,
                board.workspace_id,
                AuditAction::Update,
                EntityType::Card,
                outcome.card.id,
                &outcome.card.title,
            ))
            .await;
        Ok(outcome)
    }

    /// Cards filed under `list_id`. Rows left behind by an interrupted
    /// cross-list move are deleted and the survivors re-indexed.
    async fn current_cards(&self, list_id: Uuid) -> BoardResult<Vec<Card>> {
        let (cards, stale) = self.store.scan_current::<Card>(list_id).await?;
        if stale.is_empty() {
            return Ok(cards);
        }
        for card in &stale {
            self.store.delete::<Card>(list_id, card.id).await?;
        }
        tracing::info!(%list_id, swept = stale.len(), "removed stale card rows");
        self.resequence(cards).await
    }

    async fn resequence<T>(&self, mut items: Vec<T>) -> BoardResult<Vec<T>>
    where
        T: Ordered + Entity + Clone,
    {
        ordering::sort_by_order(&mut items);
        let before = ordering::positions(&items);
        ordering::reindex(&mut items);
        self.persist_changed(&before, &items).await?;
        Ok(items)
    }

    async fn persist_changed<T>(&self, before: &ordering::Positions, after: &[T]) -> BoardResult<()>
    where
        T: Ordered + Entity + Clone,
    {
        let changed = ordering::changed_since(before, after);
        if !changed.is_empty() {
            self.store.upsert_all(&changed).await?;
        }
        Ok(())
    }
}

pub(crate) fn validate_text(field: &str, raw: &str, min: usize, max: usize) -> BoardResult<String> {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    if length < min {
        return Err(BoardError::invalid_field(
            field,
            format!("{field} must be at least {min} characters"),
        ));
    }
    if length > max {
        return Err(BoardError::invalid_field(
            field,
            format!("{field} must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_description(raw: Option<&str>) -> BoardResult<Option<String>> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.chars().count() > DESCRIPTION_MAX {
        return Err(BoardError::invalid_field(
            "description",
            format!("description must be at most {DESCRIPTION_MAX} characters"),
        ));
    }
    Ok(Some(raw.to_string()))
}
