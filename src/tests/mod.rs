use std::ops::ControlFlow;
use std::time::Duration;

use crate::codec::{self, SavePolicy, SavedFilter, DEFAULT_SENTINEL};
use crate::events::{EventCatalog, EventFilterConfig};
use crate::filter::{EventId, FilterEngine, Selection, Side};
use crate::form::{
    FilterForm, FormError, FormFields, ALL_EVENTS_FIELD, DEFAULT_FILTER_FIELD, FILTER_IN_FIELD,
    FILTER_OUT_FIELD,
};
use crate::servers::{self, ServerError, ServerStatusDocument};


fn ids(raw: &[&str]) -> Vec<EventId> {
    raw.iter().map(|s| EventId::new(*s)).collect()
}

fn abcd_engine() -> FilterEngine {
    FilterEngine::init(ids(&["a", "b", "c", "d"]), &ids(&["c", "a"]), &[])
}

#[test]
fn saved_order_is_kept_until_sorted() {
    let mut engine = abcd_engine();
    assert_eq!(engine.included(), ids(&["c", "a"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["b", "d"]).as_slice());

    engine.sort();
    assert_eq!(engine.included(), ids(&["a", "c"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["b", "d"]).as_slice());
}

#[test]
fn transfer_moves_both_ways_at_once() {
    let mut engine = abcd_engine();
    let mut selection = Selection::new();
    selection.select(Side::Included, "a").select(Side::Excluded, "b");

    engine.move_selected(selection.clone());
    assert_eq!(engine.included(), ids(&["c", "b"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["d", "a"]).as_slice());

    let mut engine = abcd_engine();
    engine.transfer(selection);
    assert_eq!(engine.included(), ids(&["b", "c"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["a", "d"]).as_slice());
}

#[test]
fn first_run_uses_defaults() {
    let engine = FilterEngine::init(ids(&["w", "x", "y"]), &[], &ids(&["x", "y"]));
    assert_eq!(engine.included(), ids(&["x", "y"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["w"]).as_slice());
}

#[test]
fn sentinel_written_when_filter_matches_default() {
    let default = ids(&["a", "b"]);
    let engine = FilterEngine::init(ids(&["a", "b", "c"]), &[], &default);
    let out = codec::serialize(
        engine.included(),
        engine.excluded(),
        &default,
        SavePolicy::Sentinel,
    );
    assert_eq!(out.filter_in, DEFAULT_SENTINEL);
    assert_eq!(out.filter_out, None);
}

#[test]
fn dual_policy_writes_empty_brackets() {
    let out = codec::serialize(&[], &ids(&["a", "b"]), &[], SavePolicy::Dual);
    assert_eq!(out.filter_in, "[]");
    assert_eq!(out.filter_out.as_deref(), Some("[a, b]"));
}

#[test]
fn stale_saved_ids_are_dropped() {
    let engine = FilterEngine::init(ids(&["a", "b"]), &ids(&["gone", "b", "b"]), &[]);
    assert_eq!(engine.included(), ids(&["b"]).as_slice());
    assert_eq!(engine.excluded(), ids(&["a"]).as_slice());
}

#[test]
fn saved_field_decoding() {
    assert_eq!(codec::decode_saved_filter(None), SavedFilter::Default);
    assert_eq!(codec::decode_saved_filter(Some("null")), SavedFilter::Default);
    assert_eq!(codec::decode_saved_filter(Some("[a, b")), SavedFilter::Default);
    assert_eq!(
        codec::decode_saved_filter(Some("b a")),
        SavedFilter::Explicit(ids(&["b", "a"]))
    );
}

#[test]
fn missing_default_field_is_element_not_found() {
    let fields = FormFields::new().with(ALL_EVENTS_FIELD, "[a]");
    match FilterForm::bind(&fields) {
        Err(FormError::ElementNotFound { name }) => assert_eq!(name, DEFAULT_FILTER_FIELD),
        other => panic!("unexpected bind result: {other:?}"),
    }
}

#[test]
fn dual_save_needs_filter_out_field() {
    let mut fields = FormFields::new()
        .with(ALL_EVENTS_FIELD, "[a, b]")
        .with(DEFAULT_FILTER_FIELD, "[a]")
        .with(FILTER_IN_FIELD, "null");
    let form = FilterForm::bind(&fields).unwrap();
    let err = form.save(&mut fields, SavePolicy::Dual).unwrap_err();
    assert!(matches!(err, FormError::ElementNotFound { name } if name == FILTER_OUT_FIELD));
    assert_eq!(fields.get(FILTER_IN_FIELD), Some("null"));
}

// The page is rendered from the catalog, edited, saved with the sentinel
// policy and the saved value is fed back to the listener config.
#[test]
fn page_edit_save_and_listen() {
    let catalog = EventCatalog::builtin();
    let mut fields = EventFilterConfig::default().page_fields(&catalog);
    let mut form = FilterForm::bind(&fields).unwrap();
    assert!(form.engine().excluded().is_empty());

    let mut selection = Selection::new();
    selection
        .select(Side::Included, "patchset-created")
        .select(Side::Included, "ref-updated")
        .select(Side::Included, "comment-added");
    form.engine_mut().transfer(selection);

    let saved = form.save(&mut fields, SavePolicy::Sentinel).unwrap();
    assert_eq!(saved.filter_in, "change-abandoned change-merged");
    assert_eq!(
        fields.get(FILTER_IN_FIELD),
        Some("change-abandoned change-merged")
    );

    let config = EventFilterConfig::from_form_value(Some(&saved.filter_in));
    let mut listener = EventCatalog::builtin();
    config.update_event_filter(&mut listener);
    assert_eq!(
        listener.interesting(),
        ids(&["change-abandoned", "change-merged"])
    );

    let rebound = FilterForm::bind(&config.page_fields(&listener)).unwrap();
    assert_eq!(
        rebound.engine().included(),
        ids(&["change-abandoned", "change-merged"]).as_slice()
    );
    assert_eq!(rebound.engine().excluded().len(), 3);
}

#[test]
fn reset_after_edit_saves_sentinel_again() {
    let catalog = EventCatalog::builtin();
    let mut fields = EventFilterConfig::default().page_fields(&catalog);
    let mut form = FilterForm::bind(&fields).unwrap();

    let mut selection = Selection::new();
    selection.select(Side::Included, "change-merged");
    form.engine_mut().transfer(selection);
    assert_eq!(form.engine().excluded(), ids(&["change-merged"]).as_slice());

    form.reset();
    let saved = form.save(&mut fields, SavePolicy::Sentinel).unwrap();
    assert_eq!(saved.filter_in, DEFAULT_SENTINEL);
}

#[test]
fn empty_listener_filter_marks_nothing() {
    let mut catalog = EventCatalog::builtin();
    EventFilterConfig::from_form_value(Some("")).update_event_filter(&mut catalog);
    assert!(catalog.interesting().is_empty());

    EventFilterConfig::from_form_value(Some("null")).update_event_filter(&mut catalog);
    assert_eq!(catalog.interesting().len(), catalog.len());
}

#[tokio::test]
async fn poll_stops_on_first_document_when_asked() {
    let delivered = servers::poll(
        || async { Ok::<_, ServerError>(ServerStatusDocument::default()) },
        Duration::from_secs(3600),
        |_| ControlFlow::Break(()),
    )
    .await;
    assert_eq!(delivered, 1);
}
