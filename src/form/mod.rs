use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::codec::{self, SavePolicy, SerializedForm};
use crate::filter::{EventId, FilterEngine};

pub const ALL_EVENTS_FIELD: &str = "allEvents";
pub const DEFAULT_FILTER_FIELD: &str = "defaultFilter";
pub const FILTER_IN_FIELD: &str = "filterInForm";
pub const FILTER_OUT_FIELD: &str = "filterOutForm";
/// Hidden input of the search result page listing the checked rows.
pub const SELECTED_IDS_FIELD: &str = "selectedIds";
const SELECTED_ID_TERMINATOR: &str = "[]";

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form element not found: {name}")]
    ElementNotFound { name: String },

    #[error("failed to read form file: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write form file: {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse form file: {path}: {message}")]
    Parse { path: String, message: String },
}

/// Named input values of the hosting page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields {
    fields: BTreeMap<String, String>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn field(&self, name: &str) -> Result<&str, FormError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FormError::ElementNotFound {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Loads fields from a YAML or JSON mapping (YAML is a superset).
    pub fn load(path: &Path) -> Result<Self, FormError> {
        let contents = std::fs::read_to_string(path).map_err(|source| FormError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents).map_err(|message| FormError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        serde_yaml::from_str::<FormFields>(contents).map_err(|e| e.to_string())
    }

    pub fn store(&self, path: &Path) -> Result<(), FormError> {
        let rendered = serde_yaml::to_string(self).map_err(|e| FormError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, rendered).map_err(|source| FormError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Encodes checked result rows for [`SELECTED_IDS_FIELD`]: every id is
/// followed by `[]`, so `a` and `b` become `a[]b[]`.
pub fn encode_selected_ids<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(|id| format!("{}{SELECTED_ID_TERMINATOR}", id.as_ref()))
        .collect()
}

pub fn decode_selected_ids(raw: &str) -> Vec<String> {
    raw.split(SELECTED_ID_TERMINATOR)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// The filter engine bound to the page's form fields.
#[derive(Clone, Debug)]
pub struct FilterForm {
    engine: FilterEngine,
    default_included: Vec<EventId>,
}

impl FilterForm {
    /// Reads the universe, the default filter and the saved filter from the
    /// form. The universe and default fields must exist; a missing saved field
    /// means nothing was saved yet. When a filter-out list was saved next to
    /// an explicit filter-in list, the filter-in list is taken as is, so an
    /// empty one survives the reload.
    pub fn bind(fields: &FormFields) -> Result<Self, FormError> {
        let universe = codec::deserialize(fields.field(ALL_EVENTS_FIELD)?);
        let default_included = codec::deserialize(fields.field(DEFAULT_FILTER_FIELD)?);
        let saved = codec::decode_saved_filter(fields.get(FILTER_IN_FIELD));
        let saved_out = fields
            .get(FILTER_OUT_FIELD)
            .map(codec::deserialize_strict)
            .and_then(Result::ok);

        let engine = match (saved.explicit(), saved_out) {
            (Some(included), Some(_)) => FilterEngine::restore(universe, included),
            (saved_included, _) => {
                FilterEngine::init(universe, saved_included.unwrap_or(&[]), &default_included)
            }
        };
        Ok(Self {
            engine,
            default_included,
        })
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FilterEngine {
        &mut self.engine
    }

    pub fn default_included(&self) -> &[EventId] {
        &self.default_included
    }

    pub fn reset(&mut self) {
        self.engine.reset(&self.default_included);
    }

    pub fn serialize(&self, policy: SavePolicy) -> SerializedForm {
        codec::serialize(
            self.engine.included(),
            self.engine.excluded(),
            &self.default_included,
            policy,
        )
    }

    /// Writes the serialized lists into the form. The filter-in field must
    /// already exist on the page.
    pub fn save(
        &self,
        fields: &mut FormFields,
        policy: SavePolicy,
    ) -> Result<SerializedForm, FormError> {
        fields.field(FILTER_IN_FIELD)?;
        if policy == SavePolicy::Dual {
            fields.field(FILTER_OUT_FIELD)?;
        }
        let out = self.serialize(policy);
        debug!(policy = policy.label(), filter_in = %out.filter_in, "saving event filter");
        fields.set(FILTER_IN_FIELD, out.filter_in.clone());
        if let Some(filter_out) = out.filter_out.as_ref() {
            fields.set(FILTER_OUT_FIELD, filter_out.clone());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Selection, Side};

    fn page() -> FormFields {
        FormFields::new()
            .with(ALL_EVENTS_FIELD, "[a, b, c, d]")
            .with(DEFAULT_FILTER_FIELD, "[a, b, c, d]")
            .with(FILTER_IN_FIELD, "[c, a]")
    }

    #[test]
    fn missing_universe_is_element_not_found() {
        let fields = FormFields::new().with(DEFAULT_FILTER_FIELD, "[]");
        let err = FilterForm::bind(&fields).unwrap_err();
        assert!(matches!(err, FormError::ElementNotFound { name } if name == ALL_EVENTS_FIELD));
    }

    #[test]
    fn bind_reads_saved_filter() {
        let form = FilterForm::bind(&page()).unwrap();
        assert_eq!(form.engine().included(), &[EventId::new("c"), EventId::new("a")]);
        assert_eq!(form.engine().excluded(), &[EventId::new("b"), EventId::new("d")]);
    }

    #[test]
    fn null_saved_filter_falls_back_to_defaults() {
        let fields = page()
            .with(DEFAULT_FILTER_FIELD, "[b]")
            .with(FILTER_IN_FIELD, "null");
        let form = FilterForm::bind(&fields).unwrap();
        assert_eq!(form.engine().included(), &[EventId::new("b")]);
    }

    #[test]
    fn malformed_saved_filter_falls_back_to_defaults() {
        let fields = page()
            .with(DEFAULT_FILTER_FIELD, "[d]")
            .with(FILTER_IN_FIELD, "[c, a");
        let form = FilterForm::bind(&fields).unwrap();
        assert_eq!(form.engine().included(), &[EventId::new("d")]);
    }

    #[test]
    fn save_writes_sentinel_after_reset() {
        let mut fields = page();
        let mut form = FilterForm::bind(&fields).unwrap();
        form.reset();
        let out = form.save(&mut fields, SavePolicy::Sentinel).unwrap();
        assert_eq!(out.filter_in, "null");
        assert_eq!(fields.get(FILTER_IN_FIELD), Some("null"));
    }

    #[test]
    fn save_writes_plain_list_after_transfer() {
        let mut fields = page();
        let mut form = FilterForm::bind(&fields).unwrap();
        let mut sel = Selection::new();
        sel.select(Side::Excluded, "d");
        form.engine_mut().transfer(sel);
        form.save(&mut fields, SavePolicy::Sentinel).unwrap();
        assert_eq!(fields.get(FILTER_IN_FIELD), Some("a c d"));
    }

    #[test]
    fn dual_save_requires_filter_out_field() {
        let mut fields = page();
        let form = FilterForm::bind(&fields).unwrap();
        assert!(matches!(
            form.save(&mut fields, SavePolicy::Dual),
            Err(FormError::ElementNotFound { .. })
        ));

        fields.set(FILTER_OUT_FIELD, "");
        form.save(&mut fields, SavePolicy::Dual).unwrap();
        assert_eq!(fields.get(FILTER_IN_FIELD), Some("[c, a]"));
        assert_eq!(fields.get(FILTER_OUT_FIELD), Some("[b, d]"));
    }

    #[test]
    fn dual_save_survives_rebind_with_everything_filtered_out() {
        let mut fields = FormFields::new()
            .with(ALL_EVENTS_FIELD, "[a, b]")
            .with(DEFAULT_FILTER_FIELD, "[a]")
            .with(FILTER_IN_FIELD, "null")
            .with(FILTER_OUT_FIELD, "");
        let mut form = FilterForm::bind(&fields).unwrap();
        let mut sel = Selection::new();
        sel.select(Side::Included, "a");
        form.engine_mut().transfer(sel);

        let out = form.save(&mut fields, SavePolicy::Dual).unwrap();
        assert_eq!(out.filter_in, "[]");
        assert_eq!(out.filter_out.as_deref(), Some("[a, b]"));

        let rebound = FilterForm::bind(&fields).unwrap();
        assert_eq!(rebound.engine().snapshot(), form.engine().snapshot());
        assert!(rebound.engine().included().is_empty());
    }

    #[test]
    fn dual_save_round_trips_a_partial_filter() {
        let mut fields = page().with(FILTER_OUT_FIELD, "");
        let mut form = FilterForm::bind(&fields).unwrap();
        let mut sel = Selection::new();
        sel.select(Side::Included, "c").select(Side::Excluded, "d");
        form.engine_mut().transfer(sel);
        form.save(&mut fields, SavePolicy::Dual).unwrap();

        let rebound = FilterForm::bind(&fields).unwrap();
        assert_eq!(rebound.engine().snapshot(), form.engine().snapshot());
    }

    #[test]
    fn selected_rows_are_terminated_with_brackets() {
        let encoded = encode_selected_ids(&["I10abc01:100", "I20def02:7"]);
        assert_eq!(encoded, "I10abc01:100[]I20def02:7[]");
        assert_eq!(
            decode_selected_ids(&encoded),
            vec!["I10abc01:100".to_string(), "I20def02:7".to_string()]
        );
        assert_eq!(encode_selected_ids::<&str>(&[]), "");
        assert!(decode_selected_ids("").is_empty());

        let mut fields = FormFields::new().with(SELECTED_IDS_FIELD, "");
        fields.set(SELECTED_IDS_FIELD, encode_selected_ids(&["x"]));
        assert_eq!(fields.get(SELECTED_IDS_FIELD), Some("x[]"));
    }

    #[test]
    fn fields_parse_from_yaml_and_json() {
        let yaml = FormFields::parse("allEvents: \"[a]\"\ndefaultFilter: \"[a]\"\n").unwrap();
        let json = FormFields::parse(r#"{"allEvents": "[a]", "defaultFilter": "[a]"}"#).unwrap();
        assert_eq!(yaml, json);
    }
}
