//! Configuration loading from stdin, a file, or a URL.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncReadExt;

use crate::config::schema::{ConfigDocument, Origin, RuleSet, SourceKind};
use crate::config::validation::ValidationError;

/// Upper bound on a single URL fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where configuration documents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Stdin,
    File(PathBuf),
    Url(String),
}

impl ConfigSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ConfigSource::Stdin => SourceKind::Stdin,
            ConfigSource::File(_) => SourceKind::File,
            ConfigSource::Url(_) => SourceKind::Url,
        }
    }

    /// Path or URL, empty for stdin.
    pub fn location(&self) -> String {
        match self {
            ConfigSource::Stdin => String::new(),
            ConfigSource::File(path) => path.display().to_string(),
            ConfigSource::Url(url) => url.clone(),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error fetching config: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fetches raw documents from a [`ConfigSource`] and turns them into snapshots.
///
/// Stdin can only be consumed once, so its contents are cached on first read
/// and re-parsed on every later load.
pub struct ConfigLoader {
    source: ConfigSource,
    client: reqwest::Client,
    stdin_cache: Option<Vec<u8>>,
}

impl ConfigLoader {
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            client: reqwest::Client::new(),
            stdin_cache: None,
        }
    }

    /// A stdin loader whose input is already known.
    pub fn from_stdin_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stdin_cache: Some(bytes.into()),
            ..Self::new(ConfigSource::Stdin)
        }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Read the raw document.
    pub async fn fetch(&mut self) -> Result<Vec<u8>, ConfigError> {
        match &self.source {
            ConfigSource::Stdin => {
                if let Some(cached) = &self.stdin_cache {
                    return Ok(cached.clone());
                }
                let mut body = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut body)
                    .await
                    .map_err(|source| ConfigError::Io {
                        location: "stdin".into(),
                        source,
                    })?;
                self.stdin_cache = Some(body.clone());
                Ok(body)
            }
            ConfigSource::File(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ConfigError::Io {
                        location: path.display().to_string(),
                        source,
                    })
            }
            ConfigSource::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .timeout(FETCH_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }

    /// Fetch, parse and validate a fresh snapshot.
    pub async fn load(&mut self) -> Result<RuleSet, ConfigError> {
        let body = self.fetch().await?;
        let origin = Origin {
            source: self.source.kind(),
            location: self.source.location(),
            loaded_at: Utc::now(),
        };
        parse_rule_set(&body, origin)
    }
}

/// Parse and validate a YAML document into a snapshot.
pub fn parse_rule_set(body: &[u8], origin: Origin) -> Result<RuleSet, ConfigError> {
    let document = ConfigDocument::from_yaml(body)?;
    RuleSet::from_document(document, origin).map_err(ConfigError::Validation)
}
