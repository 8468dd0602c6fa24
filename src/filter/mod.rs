mod partition;

use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Opaque token naming an event type, e.g. `patchset-created`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text shown in the selection lists. Ordering is defined on this.
    pub fn display(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which of the two lists an id sits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Included,
    Excluded,
}

/// Ids highlighted by the user right before a transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub from_included: HashSet<EventId>,
    pub from_excluded: HashSet<EventId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, side: Side, id: impl Into<EventId>) -> &mut Self {
        match side {
            Side::Included => self.from_included.insert(id.into()),
            Side::Excluded => self.from_excluded.insert(id.into()),
        };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from_included.is_empty() && self.from_excluded.is_empty()
    }
}

/// Read-only snapshot of the two lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub included: Vec<EventId>,
    pub excluded: Vec<EventId>,
}

/// Returns `ids` ordered by display text. Stable for equal keys.
pub fn sort(ids: &[EventId]) -> Vec<EventId> {
    let mut out = ids.to_vec();
    partition::sort_by_display(&mut out);
    out
}

/// Owns the "filter in" / "filter out" lists for one editing session.
///
/// The lists are always disjoint and together cover exactly the ids of the
/// universe the engine was built with; ids saved earlier that are no longer
/// known are dropped when the engine is built.
#[derive(Clone, Debug)]
pub struct FilterEngine {
    universe: Vec<EventId>,
    included: Vec<EventId>,
    excluded: Vec<EventId>,
}

impl FilterEngine {
    /// Builds the lists from the known universe and the saved inclusion list.
    /// An empty saved list means nothing was configured yet, so the defaults
    /// are used in its place.
    pub fn init(
        universe: Vec<EventId>,
        saved_included: &[EventId],
        default_included: &[EventId],
    ) -> Self {
        let wanted = if saved_included.is_empty() {
            default_included
        } else {
            saved_included
        };
        Self::build(universe, wanted)
    }

    /// Builds the lists from an inclusion list that was saved together with
    /// its exclusion list. An empty list stays empty.
    pub fn restore(universe: Vec<EventId>, saved_included: &[EventId]) -> Self {
        Self::build(universe, saved_included)
    }

    fn build(universe: Vec<EventId>, wanted: &[EventId]) -> Self {
        let universe: Vec<EventId> = universe.into_iter().unique().collect();
        let (included, excluded) = partition::partition(&universe, wanted);
        debug!(
            included = included.len(),
            excluded = excluded.len(),
            "event filter initialized"
        );
        Self {
            universe,
            included,
            excluded,
        }
    }

    pub fn universe(&self) -> &[EventId] {
        &self.universe
    }

    pub fn included(&self) -> &[EventId] {
        &self.included
    }

    pub fn excluded(&self) -> &[EventId] {
        &self.excluded
    }

    pub fn side_of(&self, id: &EventId) -> Option<Side> {
        if self.included.contains(id) {
            Some(Side::Included)
        } else if self.excluded.contains(id) {
            Some(Side::Excluded)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> Partition {
        Partition {
            included: self.included.clone(),
            excluded: self.excluded.clone(),
        }
    }

    /// Moves the selection across without re-sorting.
    pub fn move_selected(&mut self, selection: Selection) {
        let (included, excluded) = partition::move_selected(
            &self.included,
            &self.excluded,
            &selection.from_included,
            &selection.from_excluded,
        );
        debug!(
            out = selection.from_included.len(),
            into = selection.from_excluded.len(),
            "moved selection"
        );
        self.included = included;
        self.excluded = excluded;
    }

    /// Moves the selection across and re-sorts both lists.
    pub fn transfer(&mut self, selection: Selection) {
        self.move_selected(selection);
        self.sort();
    }

    pub fn sort(&mut self) {
        partition::sort_by_display(&mut self.included);
        partition::sort_by_display(&mut self.excluded);
    }

    pub fn reset(&mut self, default_included: &[EventId]) {
        let (included, excluded) = partition::partition(&self.universe, default_included);
        debug!(included = included.len(), "event filter reset to defaults");
        self.included = included;
        self.excluded = excluded;
    }
}
