use itertools::Itertools;
use tracing::info;

use crate::codec::{self, DEFAULT_SENTINEL};
use crate::filter::EventId;
use crate::form::{
    FormFields, ALL_EVENTS_FIELD, DEFAULT_FILTER_FIELD, FILTER_IN_FIELD, FILTER_OUT_FIELD,
};

/// (type value, interesting by default)
const BUILTIN_EVENT_TYPES: &[(&str, bool)] = &[
    ("patchset-created", true),
    ("change-abandoned", true),
    ("change-merged", true),
    ("comment-added", true),
    ("ref-updated", true),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventType {
    pub type_value: EventId,
    pub default_interesting: bool,
    pub interesting: bool,
}

/// Event types the listener knows about, with their current interest flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventCatalog {
    types: Vec<EventType>,
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EventCatalog {
    pub fn builtin() -> Self {
        Self::from_types(BUILTIN_EVENT_TYPES)
    }

    pub fn from_types(types: &[(&str, bool)]) -> Self {
        Self {
            types: types
                .iter()
                .map(|(value, default_interesting)| EventType {
                    type_value: EventId::new(*value),
                    default_interesting: *default_interesting,
                    interesting: *default_interesting,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[EventType] {
        &self.types
    }

    pub fn find(&self, type_value: &str) -> Option<&EventType> {
        self.types
            .iter()
            .find(|t| t.type_value.as_str().eq_ignore_ascii_case(type_value))
    }

    pub fn is_interesting(&self, type_value: &str) -> bool {
        self.find(type_value).map(|t| t.interesting).unwrap_or(false)
    }

    /// Every known type value, sorted.
    pub fn all_events(&self) -> Vec<EventId> {
        self.sorted_where(|_| true)
    }

    /// Type values that are interesting out of the box, sorted.
    pub fn default_event_filter(&self) -> Vec<EventId> {
        self.sorted_where(|t| t.default_interesting)
    }

    /// Type values currently marked interesting, sorted.
    pub fn interesting(&self) -> Vec<EventId> {
        self.sorted_where(|t| t.interesting)
    }

    fn sorted_where(&self, keep: impl Fn(&EventType) -> bool) -> Vec<EventId> {
        self.types
            .iter()
            .filter(|t| keep(*t))
            .map(|t| t.type_value.clone())
            .sorted_by(|a, b| a.as_str().cmp(b.as_str()))
            .collect()
    }
}

/// Which event types the listener reacts to, as saved from the filter form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilterConfig {
    filter_in: Option<Vec<EventId>>,
}

impl EventFilterConfig {
    pub fn new(filter_in: Option<Vec<EventId>>) -> Self {
        Self { filter_in }
    }

    /// Parses the submitted filter-in value. An absent value or the `null`
    /// sentinel keeps the defaults; anything else is split on whitespace, so
    /// an empty string means nothing is interesting.
    pub fn from_form_value(raw: Option<&str>) -> Self {
        let filter_in = match raw {
            None => None,
            Some(v) if v == DEFAULT_SENTINEL => None,
            Some(v) => Some(v.split_whitespace().map(EventId::from).collect()),
        };
        Self { filter_in }
    }

    pub fn is_default(&self) -> bool {
        self.filter_in.is_none()
    }

    /// The explicit filter, or the currently interesting types when none is
    /// set.
    pub fn filter_in(&self, catalog: &EventCatalog) -> Vec<EventId> {
        match self.filter_in.as_ref() {
            Some(filter) => filter.clone(),
            None => catalog.interesting(),
        }
    }

    /// Marks each catalog type interesting when the effective filter names it.
    pub fn update_event_filter(&self, catalog: &mut EventCatalog) {
        let filter = match self.filter_in.as_ref() {
            Some(filter) => filter.clone(),
            None => catalog.default_event_filter(),
        };
        info!(
            "Listening to event types: [{}]",
            filter.iter().map(EventId::as_str).join(", ")
        );
        for t in catalog.types.iter_mut() {
            t.interesting = filter.contains(&t.type_value);
        }
    }

    /// Renders the hidden inputs of the filter page. The filter-out input
    /// starts as every type not filtered in.
    pub fn page_fields(&self, catalog: &EventCatalog) -> FormFields {
        let filter_in = self.filter_in(catalog);
        let filter_out = catalog
            .all_events()
            .into_iter()
            .filter(|id| !filter_in.contains(id))
            .collect::<Vec<_>>();
        FormFields::new()
            .with(
                ALL_EVENTS_FIELD,
                &codec::encode_bracketed(&catalog.all_events()),
            )
            .with(
                DEFAULT_FILTER_FIELD,
                &codec::encode_bracketed(&catalog.default_event_filter()),
            )
            .with(FILTER_IN_FIELD, &codec::encode_bracketed(&filter_in))
            .with(FILTER_OUT_FIELD, &codec::encode_bracketed(&filter_out))
    }
}
