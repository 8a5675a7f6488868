use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid resolver pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
}
