//! Render signal emitted by the server alongside the page.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use veil_core_types::{MediaReference, PreferenceState};

use crate::errors::{EngineError, EngineResult};

/// Page-level configuration values. The wiki's own key names are accepted alongside
/// snake_case aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSignal {
    /// Set for registered users who opted into unblurred media.
    #[serde(rename = "wgNSFWUnblur", alias = "unblur", deserialize_with = "truthy")]
    pub unblur: bool,
    /// Media already known to be sensitive, in any raw rendition.
    #[serde(
        rename = "wgNSFWFilesOnPage",
        alias = "files_on_page",
        deserialize_with = "string_list"
    )]
    pub files_on_page: Vec<String>,
    /// The page is itself the description page of sensitive media.
    #[serde(rename = "wgNSFWFilePage", alias = "file_page", deserialize_with = "truthy")]
    pub file_page: bool,
    #[serde(rename = "wgPageName", alias = "page_name")]
    pub page_name: Option<String>,
    /// Media the server already cleared as safe.
    #[serde(
        rename = "wgNSFWClearedFiles",
        alias = "cleared_files",
        deserialize_with = "string_list"
    )]
    pub cleared_files: Vec<String>,
}

impl RenderSignal {
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|err| EngineError::signal(err.to_string()))
    }

    /// The server only emits the unblur flag when the user is registered and opted in.
    pub fn preference(&self) -> PreferenceState {
        PreferenceState {
            is_registered: self.unblur,
            is_age_attested: self.unblur,
            unblur_opt_in: self.unblur,
        }
    }

    /// Sorted, de-duplicated sensitive set. Includes the page's own media when the page
    /// is a sensitive file page, either by flag or by the body marker the caller found.
    pub fn sensitive_references(&self, body_flagged: bool) -> Vec<MediaReference> {
        let mut set = normalize_all(&self.files_on_page);
        if self.file_page || body_flagged {
            if let Some(page) = self.page_reference() {
                set.insert(page);
            }
        }
        set.into_iter().collect()
    }

    pub fn cleared_references(&self) -> Vec<MediaReference> {
        normalize_all(&self.cleared_files).into_iter().collect()
    }

    fn page_reference(&self) -> Option<MediaReference> {
        let name = self.page_name.as_deref()?.replace('_', " ");
        MediaReference::parse(&name).ok()
    }
}

fn normalize_all(raw: &[String]) -> BTreeSet<MediaReference> {
    raw.iter()
        .filter_map(|entry| match MediaReference::parse(entry) {
            Ok(reference) => Some(reference),
            Err(err) => {
                debug!(target: "veil.session", raw = %entry, error = %err, "signal.reference.discarded");
                None
            }
        })
        .collect()
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    })
}

/// Accepts an array of strings or an object keyed by name, as PHP arrays serialize to
/// either depending on their keys.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let strings = |values: Vec<Value>| -> Vec<String> {
        values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()
    };
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => strings(values),
        Value::Object(map) => strings(map.into_iter().map(|(_, v)| v).collect()),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference(raw: &str) -> MediaReference {
        MediaReference::parse(raw).unwrap()
    }

    #[test]
    fn reads_wiki_config_names() {
        let signal = RenderSignal::from_json(
            r#"{"wgNSFWUnblur": false, "wgNSFWFilesOnPage": ["Zebra.png", "File:Cat.png", "cat.png", ""],
                "wgPageName": "Main_Page"}"#,
        )
        .unwrap();
        assert!(!signal.unblur);
        assert_eq!(
            signal.sensitive_references(false),
            vec![reference("Cat.png"), reference("Zebra.png")]
        );
        assert!(signal.cleared_references().is_empty());
    }

    #[test]
    fn file_page_adds_its_own_media() {
        let signal = RenderSignal::from_json(
            r#"{"wgNSFWFilePage": 1, "wgPageName": "File:Red_fox.jpg", "wgNSFWFilesOnPage": {"3": "Other.png"}}"#,
        )
        .unwrap();
        assert_eq!(
            signal.sensitive_references(false),
            vec![reference("Other.png"), reference("Red fox.jpg")]
        );

        let unflagged = RenderSignal {
            file_page: false,
            ..signal
        };
        assert_eq!(unflagged.sensitive_references(false).len(), 1);
        assert_eq!(unflagged.sensitive_references(true).len(), 2);
    }

    #[test]
    fn unblur_flag_maps_to_an_open_preference() {
        let signal = RenderSignal::from_json(r#"{"unblur": "1"}"#).unwrap();
        assert!(crate::gate::may_unblur(&signal.preference()));
        assert!(!crate::gate::may_unblur(&RenderSignal::default().preference()));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            RenderSignal::from_json("{"),
            Err(EngineError::Signal(_))
        ));
    }
}
