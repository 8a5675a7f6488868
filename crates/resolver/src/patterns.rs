use regex::Regex;
use tracing::debug;
use url::Url;
use veil_core_types::MediaReference;

use crate::config::ResolverConfig;
use crate::errors::ResolverError;

const NEUTRAL_BASE: &str = "http://localhost/";

/// Known URL shapes that expose a media name.
///
/// Relative, protocol-relative and absolute URLs are all accepted; they are parsed
/// against a neutral base so only path and query matter.
#[derive(Debug, Clone)]
pub struct UrlPatterns {
    base: Url,
    thumb_asset: Regex,
    direct_asset: Regex,
    file_page: Regex,
    file_path: Regex,
    title_param: Regex,
    hash_route: Regex,
}

impl UrlPatterns {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let roots = alternation(&config.asset_roots, "images");
        Ok(Self {
            base: Url::parse(NEUTRAL_BASE)?,
            thumb_asset: Regex::new(&format!(
                r"(?i)/(?:{roots})/thumb/[0-9a-f]/[0-9a-f]{{2}}/([^/]+)/[^/]+$"
            ))?,
            direct_asset: Regex::new(&format!(
                r"(?i)/(?:{roots})/[0-9a-f]/[0-9a-f]{{2}}/([^/]+)$"
            ))?,
            file_page: Regex::new(r"(?i)/wiki/((?:file|image|media)(?::|%3a)[^/]+)$")?,
            file_path: Regex::new(r"(?i)/(?:wiki|w)/special(?::|%3a)filepath/([^/]+)$")?,
            title_param: Regex::new(r"(?i)^\s*(?:(?:file|image|media)\s*:(.+)|special:filepath/(.+))$")?,
            hash_route: Regex::new(r"(?i)(?:file|image|media):[^#?&/]+")?,
        })
    }

    /// Matches a raw URL against asset, thumbnail, file-page and query shapes.
    pub fn match_url(&self, raw: &str) -> Option<MediaReference> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let url = Url::options().base_url(Some(&self.base)).parse(raw).ok()?;
        let path = url.path();

        let from_path = [
            &self.thumb_asset,
            &self.direct_asset,
            &self.file_page,
            &self.file_path,
        ]
        .iter()
        .find_map(|pattern| pattern.captures(path))
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string());

        let candidate = from_path.or_else(|| self.title_from_query(&url))?;
        parse_candidate(&candidate, "url")
    }

    /// Extracts a reference from a hash router fragment such as `/media/File:Foo.jpg`.
    pub fn match_hash(&self, hash: &str) -> Option<MediaReference> {
        let escaped = format!("h={}", hash.replace('+', "%2B"));
        let decoded = match url::form_urlencoded::parse(escaped.as_bytes()).next() {
            Some((_, value)) => value.into_owned(),
            None => hash.to_string(),
        };
        let found = self.hash_route.find(&decoded)?;
        parse_candidate(found.as_str(), "hash")
    }

    fn title_from_query(&self, url: &Url) -> Option<String> {
        let mut title = None;
        let mut file = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "title" if title.is_none() => title = Some(value.into_owned()),
                "file" | "wpDestFile" if file.is_none() => file = Some(value.into_owned()),
                _ => {}
            }
        }
        let title = title?;
        let captures = self.title_param.captures(&title);
        match captures {
            Some(captures) => captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|name| name.as_str().to_string()),
            // `Special:FilePath?file=Foo.png`
            None if title.eq_ignore_ascii_case("special:filepath") => file,
            None => None,
        }
    }
}

fn alternation(values: &[String], fallback: &str) -> String {
    let escaped: Vec<String> = values
        .iter()
        .map(|value| value.trim().trim_matches('/'))
        .filter(|value| !value.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        regex::escape(fallback)
    } else {
        escaped.join("|")
    }
}

pub(crate) fn parse_candidate(raw: &str, origin: &'static str) -> Option<MediaReference> {
    match MediaReference::parse(raw) {
        Ok(reference) => Some(reference),
        Err(err) => {
            debug!(
                target: "veil.resolver",
                origin,
                raw,
                error = %err,
                "resolver.reference.malformed"
            );
            None
        }
    }
}
