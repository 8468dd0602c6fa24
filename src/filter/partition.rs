use std::collections::HashSet;

use itertools::Itertools;

use super::EventId;

/// Splits `universe` into (included, excluded) using `wanted` as the ordered
/// inclusion list. Repeated universe entries count once. Ids in `wanted` that
/// are missing from the universe, or already taken by an earlier entry, are
/// dropped.
pub(in crate::filter) fn partition(
    universe: &[EventId],
    wanted: &[EventId],
) -> (Vec<EventId>, Vec<EventId>) {
    let mut remaining: Vec<&EventId> = universe.iter().unique().collect();
    let mut included: Vec<EventId> = Vec::with_capacity(wanted.len());

    for id in wanted.iter() {
        let before = remaining.len();
        remaining.retain(|e| *e != id);
        if remaining.len() < before {
            included.push(id.clone());
        }
    }

    let excluded = remaining.into_iter().cloned().collect();
    (included, excluded)
}

/// Moves the selected ids across in a single step. Both moves read the
/// pre-transfer lists, so an id that just moved can't move back in the same
/// call. Moved ids are appended to the destination in source order.
pub(in crate::filter) fn move_selected(
    included: &[EventId],
    excluded: &[EventId],
    from_included: &HashSet<EventId>,
    from_excluded: &HashSet<EventId>,
) -> (Vec<EventId>, Vec<EventId>) {
    let (leaving_in, staying_in): (Vec<EventId>, Vec<EventId>) = included
        .iter()
        .cloned()
        .partition(|id| from_included.contains(id));
    let (leaving_out, staying_out): (Vec<EventId>, Vec<EventId>) = excluded
        .iter()
        .cloned()
        .partition(|id| from_excluded.contains(id));

    let mut next_included = staying_in;
    next_included.extend(leaving_out);
    let mut next_excluded = staying_out;
    next_excluded.extend(leaving_in);
    (next_included, next_excluded)
}

pub(in crate::filter) fn sort_by_display(ids: &mut [EventId]) {
    if ids.len() < 2 {
        return;
    }
    // slice::sort_by is stable
    ids.sort_by(|a, b| a.display().cmp(b.display()));
}
