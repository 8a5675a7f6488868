//! Engine configuration.
//!
//! Layers, lowest first: built-in defaults, then each existing config file (YAML or
//! JSON), then `MEDIA_VEIL__` environment variables whose `__`-separated path names a
//! field, e.g. `MEDIA_VEIL__OVERLAY__INTENT_GRACE_FRAMES=10`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use veil_blur::MarkerConfig;
use veil_classification::ClassificationConfig;
use veil_overlay::OverlayConfig;
use veil_resolver::ResolverConfig;

use crate::errors::{EngineError, EngineResult};

const ENV_PREFIX: &str = "MEDIA_VEIL__";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub markers: MarkerConfig,
    pub resolver: ResolverConfig,
    pub overlay: OverlayConfig,
    pub classification: ClassificationConfig,
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> EngineResult<EngineConfig> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> EngineResult<EngineConfig> {
    let mut tree = serde_json::to_value(EngineConfig::default())
        .map_err(|err| EngineError::config(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            apply_overlays(&mut tree, overlays_from_file(path)?)?;
        }
    }

    if options.include_env {
        apply_overlays(&mut tree, overlays_from_env())?;
    }

    serde_json::from_value(tree).map_err(|err| EngineError::config(err.to_string()))
}

struct ConfigOverlay {
    path: String,
    value: Value,
}

fn apply_overlays(tree: &mut Value, overlays: Vec<ConfigOverlay>) -> EngineResult<()> {
    for overlay in overlays {
        set_path(tree, &overlay.path, overlay.value)?;
    }
    Ok(())
}

fn set_path(tree: &mut Value, path: &str, value: Value) -> EngineResult<()> {
    let mut cursor = tree;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let map = match cursor {
            Value::Object(map) => map,
            _ => return Err(EngineError::config(format!("{path}: not a section"))),
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> EngineResult<Vec<ConfigOverlay>> {
    let content = fs::read_to_string(path)?;
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|err| EngineError::config(format!("{}: {err}", path.display())))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| EngineError::config(err.to_string()))?;
    Ok(flatten_value(json_value, None))
}

fn overlays_from_env() -> Vec<ConfigOverlay> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push(ConfigOverlay {
                path,
                value: parse_env_value(&raw),
            });
        }
    }
    overlays
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>) -> Vec<ConfigOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key_segment}"),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix)));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![ConfigOverlay { path, value: other }],
            None => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_parse_like_json_first() {
        assert_eq!(parse_env_value("12"), Value::from(12));
        assert_eq!(parse_env_value("false"), Value::Bool(false));
        assert_eq!(parse_env_value(r#"["a","b"]"#), serde_json::json!(["a", "b"]));
        assert_eq!(parse_env_value("nsfw-hide"), Value::from("nsfw-hide"));
        assert_eq!(parse_env_value(""), Value::Null);
    }

    #[test]
    fn nested_sections_flatten_to_dotted_paths() {
        let overlays = flatten_value(
            serde_json::json!({"Overlay": {"intent_grace_frames": 4}, "markers": {"media_tags": ["img", "video"]}}),
            None,
        );
        let mut paths: Vec<_> = overlays.iter().map(|o| o.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["markers.media_tags", "overlay.intent_grace_frames"]);
    }

    #[test]
    fn scalar_cannot_become_a_section() {
        let mut tree = serde_json::to_value(EngineConfig::default()).unwrap();
        assert!(set_path(&mut tree, "overlay.root_class.inner", Value::Null).is_err());
        set_path(&mut tree, "overlay.root_class", Value::from("viewer")).unwrap();
        let config: EngineConfig = serde_json::from_value(tree).unwrap();
        assert_eq!(config.overlay.root_class, "viewer");
    }
}
