//! Dense ordering of items inside a container (cards in a list, lists in a
//! board).
//!
//! Every function here is pure: it takes the container's current items and
//! returns the resulting sequence with `order` rewritten to `0..n-1`. Callers
//! persist the items reported by [`changed_since`].

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{BoardError, BoardResult};
use crate::models::Ordered;

/// Where an item sat before a mutation: `(container, order)`.
pub type Positions = HashMap<Uuid, (Uuid, i32)>;

/// Result of moving an item between two containers.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMove<T> {
    pub source: Vec<T>,
    pub destination: Vec<T>,
    pub moved: T,
}

/// Sorts by `order`, falling back to id so ties are deterministic.
pub fn sort_by_order<T: Ordered>(items: &mut [T]) {
    items.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(&b.id())));
}

/// Order for an item appended to `items`. An empty container yields 0.
pub fn next_order<T: Ordered>(items: &[T]) -> i32 {
    items
        .iter()
        .map(Ordered::order)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Rewrites `order` to the item's index.
pub fn reindex<T: Ordered>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_order(to_order(index));
    }
}

pub fn positions<T: Ordered>(items: &[T]) -> Positions {
    items
        .iter()
        .map(|item| (item.id(), (item.container_id(), item.order())))
        .collect()
}

/// Items whose container or order differs from `before`, including items
/// that were not present at all.
pub fn changed_since<T: Ordered + Clone>(before: &Positions, after: &[T]) -> Vec<T> {
    after
        .iter()
        .filter(|item| before.get(&item.id()) != Some(&(item.container_id(), item.order())))
        .cloned()
        .collect()
}

/// Splices `item` directly after `predecessor_id` and re-indexes.
pub fn insert_after<T: Ordered>(
    mut items: Vec<T>,
    mut item: T,
    predecessor_id: Uuid,
) -> BoardResult<Vec<T>> {
    sort_by_order(&mut items);
    let index = items
        .iter()
        .position(|existing| existing.id() == predecessor_id)
        .ok_or_else(|| {
            BoardError::containment("the preceding item does not belong to this container")
        })?;
    item.set_container_id(items[index].container_id());
    items.insert(index + 1, item);
    reindex(&mut items);
    Ok(items)
}

/// Applies the caller's desired sequence. Every id must belong to the
/// container; items the caller left out keep their relative order after the
/// listed ones.
pub fn reorder_within<T: Ordered>(mut items: Vec<T>, ordered_ids: &[Uuid]) -> BoardResult<Vec<T>> {
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    if let Some(duplicate) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(BoardError::invalid_field(
            "ordered_ids",
            format!("{duplicate} appears more than once"),
        ));
    }

    let present: HashSet<Uuid> = items.iter().map(Ordered::id).collect();
    if let Some(foreign) = ordered_ids.iter().find(|id| !present.contains(id)) {
        return Err(BoardError::containment(format!(
            "{foreign} does not belong to this container"
        )));
    }

    sort_by_order(&mut items);
    let rank: HashMap<Uuid, usize> = ordered_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();
    // Stable sort: omitted items keep their current relative order.
    items.sort_by_key(|item| rank.get(&item.id()).copied().unwrap_or(usize::MAX));
    reindex(&mut items);
    Ok(items)
}

/// Moves one item to `destination_index` inside its own container.
pub fn move_within<T: Ordered>(
    mut items: Vec<T>,
    item_id: Uuid,
    destination_index: i64,
) -> BoardResult<Vec<T>> {
    sort_by_order(&mut items);
    let from = items
        .iter()
        .position(|item| item.id() == item_id)
        .ok_or_else(|| BoardError::containment(format!("{item_id} does not belong to this container")))?;
    let item = items.remove(from);
    let to = clamp_index(destination_index, items.len());
    items.insert(to, item);
    reindex(&mut items);
    Ok(items)
}

/// Removes `item_id` from `source`, splices it into `destination` at the
/// clamped index and re-indexes both sides.
pub fn move_across<T: Ordered>(
    mut source: Vec<T>,
    mut destination: Vec<T>,
    destination_id: Uuid,
    item_id: Uuid,
    destination_index: i64,
) -> BoardResult<CrossMove<T>>
where
    T: Clone,
{
    if destination.iter().any(|item| item.id() == item_id) {
        return Err(BoardError::containment(format!(
            "{item_id} already belongs to the destination"
        )));
    }
    sort_by_order(&mut source);
    sort_by_order(&mut destination);

    let from = source
        .iter()
        .position(|item| item.id() == item_id)
        .ok_or_else(|| BoardError::containment(format!("{item_id} does not belong to the source")))?;
    let mut moved = source.remove(from);
    moved.set_container_id(destination_id);

    let to = clamp_index(destination_index, destination.len());
    destination.insert(to, moved);
    reindex(&mut source);
    reindex(&mut destination);

    let moved = destination[to].clone();
    Ok(CrossMove {
        source,
        destination,
        moved,
    })
}

fn clamp_index(index: i64, len: usize) -> usize {
    usize::try_from(index.max(0)).map_or(len, |index| index.min(len))
}

fn to_order(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
