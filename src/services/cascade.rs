use futures_util::future::join_all;
use serde::Serialize;

use crate::error::{BoardError, BoardResult};
use crate::models::{Board, Card, Invitation, List, Membership, Workspace};
use crate::store::EntityStore;

/// Counts of rows removed by a cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub boards: usize,
    pub lists: usize,
    pub cards: usize,
}

impl CascadeReport {
    fn absorb(&mut self, other: CascadeReport) {
        self.boards += other.boards;
        self.lists += other.lists;
        self.cards += other.cards;
    }
}

/// Bottom-up deletion of the workspace → board → list → card tree.
///
/// Children are removed before their parent. Every child is attempted even
/// when a sibling fails; if any child could not be removed the parent row is
/// kept and the cascade reports `StoreUnavailable`, so running it again
/// finishes the job. Deletes are at-least-once, not atomic.
#[derive(Clone)]
pub struct CascadeManager {
    store: EntityStore,
}

impl CascadeManager {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn delete_list(&self, list: &List) -> BoardResult<CascadeReport> {
        let (cards, stale) = self.store.scan_current::<Card>(list.id).await?;
        let results = join_all(cards.iter().chain(&stale).map(|card| self.store.remove(card))).await;
        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                list_id = %list.id,
                failed,
                total = cards.len(),
                "cascade left cards behind; list kept"
            );
            return Err(BoardError::StoreUnavailable(format!(
                "{failed} of {} cards could not be deleted",
                cards.len()
            )));
        }

        self.store.remove(list).await?;
        Ok(CascadeReport {
            boards: 0,
            lists: 1,
            cards: cards.len(),
        })
    }

    pub async fn delete_board(&self, board: &Board) -> BoardResult<CascadeReport> {
        let lists = self.store.scan::<List>(board.id).await?;
        let mut report = CascadeReport::default();
        let mut failed = 0usize;
        for list in &lists {
            match self.delete_list(list).await {
                Ok(child) => report.absorb(child),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(board_id = %board.id, list_id = %list.id, error = %err, "failed to delete list");
                }
            }
        }
        if failed > 0 {
            return Err(BoardError::StoreUnavailable(format!(
                "{failed} of {} lists could not be deleted",
                lists.len()
            )));
        }

        self.store.remove(board).await?;
        report.boards += 1;
        tracing::info!(
            board_id = %board.id,
            lists = report.lists,
            cards = report.cards,
            "deleted board"
        );
        Ok(report)
    }

    /// Removes boards, invitations and memberships before the workspace row.
    /// Audit entries are append-only and stay.
    pub async fn delete_workspace(&self, workspace: &Workspace) -> BoardResult<CascadeReport> {
        let boards = self.store.scan::<Board>(workspace.id).await?;
        let mut report = CascadeReport::default();
        let mut failed = 0usize;
        for board in &boards {
            match self.delete_board(board).await {
                Ok(child) => report.absorb(child),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(workspace_id = %workspace.id, board_id = %board.id, error = %err, "failed to delete board");
                }
            }
        }

        let invitations = self.store.scan::<Invitation>(workspace.id).await?;
        let memberships = self
            .store
            .find_by_field::<Membership>("workspace_id", &workspace.id.to_string())
            .await?;
        let invitation_results =
            join_all(invitations.iter().map(|invitation| self.store.remove(invitation))).await;
        let membership_results =
            join_all(memberships.iter().map(|membership| self.store.remove(membership))).await;
        failed += invitation_results
            .iter()
            .chain(membership_results.iter())
            .filter(|result| result.is_err())
            .count();

        if failed > 0 {
            tracing::warn!(workspace_id = %workspace.id, failed, "workspace cascade incomplete; workspace kept");
            return Err(BoardError::StoreUnavailable(format!(
                "{failed} children of workspace {} could not be deleted",
                workspace.id
            )));
        }

        self.store.remove(workspace).await?;
        Ok(report)
    }
}
