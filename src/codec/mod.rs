use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::filter::EventId;

/// Saved field value meaning "use the system default filter".
pub const DEFAULT_SENTINEL: &str = "null";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unbalanced brackets in event list: {raw}")]
    UnbalancedBrackets { raw: String },
}

/// How the filter is written back into the form on save.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    /// Space-delimited filter-in list, or `null` when it equals the default.
    #[default]
    #[serde(alias = "sentinel-on-match")]
    Sentinel,
    /// Both lists, each as `[a, b]`. No sentinel.
    #[serde(alias = "dual-list")]
    Dual,
}

impl SavePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sentinel" | "sentinel-on-match" | "a" => Some(Self::Sentinel),
            "dual" | "dual-list" | "b" => Some(Self::Dual),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sentinel => "sentinel",
            Self::Dual => "dual",
        }
    }
}

/// Field values produced by a save. `filter_out` is only set by
/// [`SavePolicy::Dual`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SerializedForm {
    pub filter_in: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_out: Option<String>,
}

/// Decoded saved filter-in field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SavedFilter {
    Default,
    Explicit(Vec<EventId>),
}

impl SavedFilter {
    pub fn explicit(&self) -> Option<&[EventId]> {
        match self {
            Self::Default => None,
            Self::Explicit(ids) => Some(ids),
        }
    }
}

pub fn encode_bracketed(ids: &[EventId]) -> String {
    format!("[{}]", ids.iter().map(EventId::as_str).join(", "))
}

pub fn encode_plain(ids: &[EventId]) -> String {
    ids.iter().map(EventId::as_str).join(" ")
}

/// Serializes the current lists for a save. Never touches the engine state.
pub fn serialize(
    included: &[EventId],
    excluded: &[EventId],
    default_included: &[EventId],
    policy: SavePolicy,
) -> SerializedForm {
    match policy {
        SavePolicy::Sentinel => {
            let filter_in = if included == default_included {
                DEFAULT_SENTINEL.to_string()
            } else {
                encode_plain(included)
            };
            SerializedForm {
                filter_in,
                filter_out: None,
            }
        }
        SavePolicy::Dual => SerializedForm {
            filter_in: encode_bracketed(included),
            filter_out: Some(encode_bracketed(excluded)),
        },
    }
}

/// Parses `[a, b, c]` or `a b c`. Brackets must be balanced.
pub fn deserialize_strict(raw: &str) -> Result<Vec<EventId>, CodecError> {
    let trimmed = raw.trim();
    let opens = trimmed.starts_with('[');
    let closes = trimmed.ends_with(']');

    if opens != closes || (opens && trimmed.len() < 2) {
        return Err(CodecError::UnbalancedBrackets {
            raw: raw.to_string(),
        });
    }

    let ids = if opens {
        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.contains('[') || inner.contains(']') {
            return Err(CodecError::UnbalancedBrackets {
                raw: raw.to_string(),
            });
        }
        inner
            .split(", ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EventId::from)
            .collect()
    } else {
        trimmed
            .split(' ')
            .filter(|s| !s.is_empty())
            .map(EventId::from)
            .collect()
    };
    Ok(ids)
}

/// Like [`deserialize_strict`], but a malformed value reads as empty.
pub fn deserialize(raw: &str) -> Vec<EventId> {
    match deserialize_strict(raw) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("ignoring malformed event list: {e}");
            Vec::new()
        }
    }
}

/// Reads the saved filter-in field. Absent, blank, `null` or malformed values
/// all mean "use the defaults".
pub fn decode_saved_filter(raw: Option<&str>) -> SavedFilter {
    let raw = match raw.map(str::trim) {
        None | Some("") => return SavedFilter::Default,
        Some(v) if v == DEFAULT_SENTINEL => return SavedFilter::Default,
        Some(v) => v,
    };
    match deserialize_strict(raw) {
        Ok(ids) => SavedFilter::Explicit(ids),
        Err(e) => {
            warn!("saved event filter is malformed, falling back to defaults: {e}");
            SavedFilter::Default
        }
    }
}
