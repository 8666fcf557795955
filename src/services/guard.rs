use uuid::Uuid;

use crate::error::{BoardError, BoardResult};
use crate::models::{Board, Card, List, Membership};
use crate::store::EntityStore;

/// Membership checks gating every board operation.
///
/// Authorization always happens before the caller learns anything about the
/// target: a missing board and a board in a foreign workspace both answer
/// [`BoardError::Unauthorized`].
#[derive(Clone)]
pub struct AccessGuard {
    store: EntityStore,
}

impl AccessGuard {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn authorize(&self, user_id: Uuid, workspace_id: Uuid) -> BoardResult<Membership> {
        self.store
            .get::<Membership>(user_id, workspace_id)
            .await?
            .ok_or(BoardError::Unauthorized)
    }

    pub async fn authorize_owner(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> BoardResult<Membership> {
        let membership = self.authorize(user_id, workspace_id).await?;
        if !membership.is_owner() {
            tracing::debug!(%user_id, %workspace_id, "owner-only operation denied");
            return Err(BoardError::Unauthorized);
        }
        Ok(membership)
    }

    /// Resolves the board's workspace and checks the caller's membership.
    pub async fn authorize_board(
        &self,
        user_id: Uuid,
        board_id: Uuid,
    ) -> BoardResult<(Membership, Board)> {
        let board = self
            .store
            .get_by_row::<Board>(board_id)
            .await?
            .ok_or(BoardError::Unauthorized)?;
        let membership = self.authorize(user_id, board.workspace_id).await?;
        Ok((membership, board))
    }

    /// Loads a list that must live on `board`.
    pub async fn list_in_board(&self, board: &Board, list_id: Uuid) -> BoardResult<List> {
        if let Some(list) = self.store.get::<List>(board.id, list_id).await? {
            return Ok(list);
        }
        match self.store.get_by_row::<List>(list_id).await? {
            Some(_) => Err(BoardError::containment(
                "list does not belong to this board",
            )),
            None => Err(BoardError::NotFound("list")),
        }
    }

    /// Loads a card and its list, both of which must live on `board`.
    pub async fn card_in_board(&self, board: &Board, card_id: Uuid) -> BoardResult<(List, Card)> {
        let card = self
            .store
            .get_by_row::<Card>(card_id)
            .await?
            .ok_or(BoardError::NotFound("card"))?;
        let list = self
            .store
            .get::<List>(board.id, card.list_id)
            .await?
            .ok_or_else(|| BoardError::containment("card does not belong to this board"))?;
        Ok((list, card))
    }
}
