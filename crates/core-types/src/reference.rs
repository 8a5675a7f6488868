use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Canonical namespace every reference is rendered under.
pub const FILE_NAMESPACE: &str = "File";

const MAX_NAME_BYTES: usize = 255;

static NAMESPACE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^:?\s*(?:file|image|media)\s*:\s*").unwrap());
static THUMB_SIZE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+px-").unwrap());
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference is empty after normalization")]
    Empty,
    #[error("reference contains illegal character {0:?}")]
    IllegalCharacter(char),
    #[error("reference name exceeds 255 bytes")]
    TooLong,
}

/// Canonical identifier of one media object, e.g. `File:Red_fox.jpg`.
///
/// A reference can only be obtained through [`MediaReference::parse`], so every value
/// is already normalized and two references compare equal exactly when they name the
/// same media object.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MediaReference {
    name: String,
}

impl MediaReference {
    /// Normalizes any raw rendition of a media name: bare filenames, namespaced titles,
    /// percent-encoded path fragments and thumbnail names all collapse onto one value.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        normalize_name(raw).map(|name| Self { name })
    }

    /// Name without namespace, underscore separated.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespaced key form, `File:Red_fox.jpg`.
    pub fn title(&self) -> String {
        format!("{FILE_NAMESPACE}:{}", self.name)
    }

    /// Human readable form, `File:Red fox.jpg`.
    pub fn display_title(&self) -> String {
        format!("{FILE_NAMESPACE}:{}", self.name.replace('_', " "))
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILE_NAMESPACE}:{}", self.name)
    }
}

impl FromStr for MediaReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MediaReference {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaReference> for String {
    fn from(value: MediaReference) -> Self {
        value.title()
    }
}

fn normalize_name(raw: &str) -> Result<String, ReferenceError> {
    let decoded = percent_decode(raw.trim());
    let without_fragment = decoded.split('#').next().unwrap_or_default();
    let last_segment = without_fragment.rsplit('/').next().unwrap_or_default();
    let unprefixed = NAMESPACE_NOISE.replace(last_segment.trim(), "");
    let unsized_name = THUMB_SIZE_PREFIX.replace(&unprefixed, "");

    let separated: String = unsized_name
        .trim()
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .collect();
    let collapsed = UNDERSCORE_RUN.replace_all(&separated, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        return Err(ReferenceError::Empty);
    }
    if let Some(ch) = trimmed.chars().find(|ch| is_illegal(*ch)) {
        return Err(ReferenceError::IllegalCharacter(ch));
    }
    if trimmed.len() > MAX_NAME_BYTES {
        return Err(ReferenceError::TooLong);
    }
    Ok(uppercase_first(trimmed))
}

fn percent_decode(raw: &str) -> Cow<'_, str> {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

fn is_illegal(ch: char) -> bool {
    ch.is_control() || matches!(ch, '<' | '>' | '[' | ']' | '{' | '}' | '|' | ':' | '\\')
}

fn uppercase_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_and_namespaced_names_agree() {
        let bare = MediaReference::parse("Cat.png").unwrap();
        let titled = MediaReference::parse("File:Cat.png").unwrap();
        let noisy = MediaReference::parse(" :file : Cat.png ").unwrap();
        assert_eq!(bare, titled);
        assert_eq!(bare, noisy);
        assert_eq!(bare.title(), "File:Cat.png");
    }

    #[test]
    fn separators_and_first_letter_fold() {
        let a = MediaReference::parse("File:red  fox photo.jpg").unwrap();
        let b = MediaReference::parse("Red_fox__photo.jpg").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name(), "Red_fox_photo.jpg");
        assert_eq!(a.display_title(), "File:Red fox photo.jpg");
    }

    #[test]
    fn percent_encoding_and_paths_collapse() {
        let reference = MediaReference::parse("/wiki/File:Caf%C3%A9%20menu.png").unwrap();
        assert_eq!(reference.name(), "Café_menu.png");
    }

    #[test]
    fn invalid_percent_sequences_fall_back_to_raw_text() {
        let reference = MediaReference::parse("Odd%FFname.png").unwrap();
        assert_eq!(reference.name(), "Odd%FFname.png");
    }

    #[test]
    fn thumbnail_prefix_is_stripped() {
        let thumb = MediaReference::parse("320px-Dog.jpg").unwrap();
        assert_eq!(thumb, MediaReference::parse("Image:Dog.jpg").unwrap());
    }

    #[test]
    fn fragments_are_dropped() {
        let reference = MediaReference::parse("File:Dog.jpg#section").unwrap();
        assert_eq!(reference.name(), "Dog.jpg");
    }

    #[test]
    fn rejects_empty_and_illegal_names() {
        assert_eq!(MediaReference::parse("File:").unwrap_err(), ReferenceError::Empty);
        assert_eq!(MediaReference::parse("   ").unwrap_err(), ReferenceError::Empty);
        assert_eq!(
            MediaReference::parse("Category:Dogs").unwrap_err(),
            ReferenceError::IllegalCharacter(':')
        );
        assert_eq!(
            MediaReference::parse("a|b.png").unwrap_err(),
            ReferenceError::IllegalCharacter('|')
        );
        let long = format!("{}.png", "x".repeat(300));
        assert_eq!(MediaReference::parse(&long).unwrap_err(), ReferenceError::TooLong);
    }

    #[test]
    fn serializes_as_title_string() {
        let reference = MediaReference::parse("cat.png").unwrap();
        let json = serde_json_roundtrip(&reference);
        assert_eq!(json, reference);
    }

    #[cfg(feature = "serde-full")]
    fn serde_json_roundtrip(reference: &MediaReference) -> MediaReference {
        let text = serde_json::to_string(reference).unwrap();
        assert_eq!(text, "\"File:Cat.png\"");
        serde_json::from_str(&text).unwrap()
    }

    #[cfg(not(feature = "serde-full"))]
    fn serde_json_roundtrip(reference: &MediaReference) -> MediaReference {
        MediaReference::parse(&String::from(reference.clone())).unwrap()
    }
}
