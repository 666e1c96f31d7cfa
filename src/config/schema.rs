//! Rule model definitions.
//!
//! Two layers live here:
//! - the *document* types, deserialized from the YAML config as written
//!   (optional fields, unresolved group references);
//! - the resolved [`RuleSet`] snapshot, built only from a validated document
//!   and never mutated afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::validation::{validate_document, ValidationError};
use crate::routing::resolver::UrlTemplate;

/// Listening port used when the document does not set one.
pub const DEFAULT_PORT: u16 = 80;

/// Realm presented in challenges when a credential group does not set one.
pub const DEFAULT_REALM: &str = "Restricted";

/// Staleness bound for URL-sourced snapshots.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Where a snapshot was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Nothing loaded yet.
    #[default]
    None,
    Stdin,
    File,
    Url,
}

/// Outcome of a match that a refresh domain reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOn {
    Hit,
    Miss,
}

/// A per-domain refresh trigger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshDomain {
    /// Domain pattern, matched with the same rules as redirect `from`.
    pub domain: String,

    /// Whether a hit or a miss on this domain triggers a reload.
    #[serde(rename = "refresh-on")]
    pub trigger_on: TriggerOn,
}

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// Root of the YAML config document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigDocument {
    pub port: Option<u16>,
    pub temp_redirect: Option<bool>,
    pub auth: Option<AuthDocument>,
    pub url_config_refresh: Option<RefreshDocument>,
    pub redirects: Vec<RedirectDocument>,
}

/// Credential schemes. Only Basic is supported.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AuthDocument {
    pub basic_auth: BTreeMap<String, CredentialGroupDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialGroupDocument {
    pub realm: Option<String>,
    pub users: Vec<UserDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserDocument {
    pub username: String,
    pub password: String,
}

/// Refresh options for URL-sourced configs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefreshDocument {
    #[serde(deserialize_with = "deserialize_opt_duration")]
    pub cache_ttl: Option<Duration>,
    pub refresh_on_hit: bool,
    pub refresh_on_miss: bool,
    pub remap_after_refresh: bool,
    pub refresh_domains: Vec<RefreshDomain>,
}

/// A redirect rule as written in the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RedirectDocument {
    pub from: String,
    pub to: String,
    pub preserve_path: bool,
    pub temp_redirect: Option<bool>,
    pub auth: Vec<String>,
}

impl ConfigDocument {
    /// Parse a YAML document. Semantic checks are not applied here.
    /// An empty document is a valid, empty config.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice::<Option<Self>>(bytes).map(Option::unwrap_or_default)
    }

    /// Trim the trailing `/` the document may carry on `from` and `to`.
    fn normalize(&mut self) {
        for redirect in &mut self.redirects {
            trim_trailing_slash(&mut redirect.from);
            trim_trailing_slash(&mut redirect.to);
        }
    }
}

fn trim_trailing_slash(value: &mut String) {
    *value = value.trim().trim_end_matches('/').to_string();
}

// ---------------------------------------------------------------------------
// Resolved snapshot
// ---------------------------------------------------------------------------

/// Provenance of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub source: SourceKind,
    pub location: String,
    pub loaded_at: DateTime<Utc>,
}

/// One immutable configuration snapshot.
///
/// Built from a validated [`ConfigDocument`]; replaced wholesale on reload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleSet {
    pub source: SourceKind,
    #[serde(rename = "config-uri")]
    pub source_location: String,
    pub loaded_at: Option<DateTime<Utc>>,
    pub port: u16,
    #[serde(rename = "temp-redirect")]
    pub default_temp_redirect: bool,
    #[serde(rename = "url-config-refresh")]
    pub refresh: RefreshPolicy,
    #[serde(rename = "basic-auth")]
    pub credential_groups: BTreeMap<String, Arc<CredentialGroup>>,
    #[serde(rename = "redirects")]
    pub rules: Vec<Arc<RedirectRule>>,
}

/// Refresh policy carried by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RefreshPolicy {
    #[serde(serialize_with = "serialize_duration")]
    pub cache_ttl: Duration,
    pub refresh_on_hit: bool,
    pub refresh_on_miss: bool,
    pub remap_after_refresh: bool,
    pub refresh_domains: Vec<RefreshDomain>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_on_hit: false,
            refresh_on_miss: false,
            remap_after_refresh: false,
            refresh_domains: Vec::new(),
        }
    }
}

/// A named set of users sharing one realm.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialGroup {
    pub realm: String,
    pub users: Vec<CredentialUser>,
}

/// A user whose credentials are kept only as SHA-256 digests.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialUser {
    username: String,
    #[serde(skip)]
    username_digest: [u8; 32],
    #[serde(rename = "password", serialize_with = "serialize_masked")]
    password_digest: [u8; 32],
}

impl CredentialUser {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            username_digest: Sha256::digest(username.as_bytes()).into(),
            password_digest: Sha256::digest(password.as_bytes()).into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn username_digest(&self) -> &[u8; 32] {
        &self.username_digest
    }

    pub fn password_digest(&self) -> &[u8; 32] {
        &self.password_digest
    }
}

/// A resolved redirect rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    pub preserve_path: bool,
    pub temp_redirect: bool,
    #[serde(rename = "auth", skip_serializing_if = "Vec::is_empty")]
    pub credential_group_names: Vec<String>,
    #[serde(skip)]
    pub(crate) credential_groups: Vec<Arc<CredentialGroup>>,
    #[serde(skip)]
    pub(crate) target: UrlTemplate,
}

impl RedirectRule {
    /// Credential groups this rule is protected by, in reference order.
    pub fn credential_groups(&self) -> &[Arc<CredentialGroup>] {
        &self.credential_groups
    }

    pub fn requires_auth(&self) -> bool {
        !self.credential_groups.is_empty()
    }

    /// The single realm shared by the rule's credential groups.
    pub fn realm(&self) -> Option<&str> {
        self.credential_groups.first().map(|group| group.realm.as_str())
    }

    pub fn target(&self) -> &UrlTemplate {
        &self.target
    }
}

impl RuleSet {
    /// The snapshot a manager holds before its first successful load.
    pub fn empty(source: SourceKind, location: impl Into<String>) -> Self {
        Self {
            source,
            source_location: location.into(),
            loaded_at: None,
            port: DEFAULT_PORT,
            default_temp_redirect: true,
            refresh: RefreshPolicy::default(),
            credential_groups: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /// Validate a document and resolve it into a snapshot.
    ///
    /// Defaults are applied first, then per-rule overrides: an unset
    /// `temp-redirect` on a rule resolves to the document-level value.
    pub fn from_document(
        mut document: ConfigDocument,
        origin: Origin,
    ) -> Result<Self, Vec<ValidationError>> {
        document.normalize();
        validate_document(&document)?;

        let default_temp_redirect = document.temp_redirect.unwrap_or(true);

        let credential_groups: BTreeMap<String, Arc<CredentialGroup>> = document
            .auth
            .map(|auth| auth.basic_auth)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, group)| {
                let realm = group
                    .realm
                    .filter(|realm| !realm.is_empty())
                    .unwrap_or_else(|| DEFAULT_REALM.to_string());
                let users = group
                    .users
                    .iter()
                    .map(|user| CredentialUser::new(&user.username, &user.password))
                    .collect();
                (name, Arc::new(CredentialGroup { realm, users }))
            })
            .collect();

        let mut rules = Vec::with_capacity(document.redirects.len());
        for (index, redirect) in document.redirects.into_iter().enumerate() {
            let target = UrlTemplate::parse(&redirect.to).ok_or_else(|| {
                vec![ValidationError::InvalidTo {
                    index,
                    value: redirect.to.clone(),
                }]
            })?;

            let groups = redirect
                .auth
                .iter()
                .filter_map(|name| credential_groups.get(name).cloned())
                .collect();

            rules.push(Arc::new(RedirectRule {
                temp_redirect: redirect.temp_redirect.unwrap_or(default_temp_redirect),
                from: redirect.from,
                to: redirect.to,
                preserve_path: redirect.preserve_path,
                credential_group_names: redirect.auth,
                credential_groups: groups,
                target,
            }));
        }

        let refresh = match document.url_config_refresh {
            Some(options) => RefreshPolicy {
                cache_ttl: options
                    .cache_ttl
                    .filter(|ttl| !ttl.is_zero())
                    .unwrap_or(DEFAULT_CACHE_TTL),
                refresh_on_hit: options.refresh_on_hit,
                refresh_on_miss: options.refresh_on_miss,
                remap_after_refresh: options.remap_after_refresh,
                refresh_domains: options.refresh_domains,
            },
            None => RefreshPolicy::default(),
        };

        Ok(Self {
            source: origin.source,
            source_location: origin.location,
            loaded_at: Some(origin.loaded_at),
            port: document.port.filter(|port| *port != 0).unwrap_or(DEFAULT_PORT),
            default_temp_redirect,
            refresh,
            credential_groups,
            rules,
        })
    }

    /// Render the snapshot as YAML, with passwords masked.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_else(|e| format!("# unable to render config: {e}\n"))
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

fn serialize_masked<S: Serializer>(_: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("********")
}

fn serialize_duration<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*value))
}

fn deserialize_opt_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => Ok(Some(Duration::from_secs(secs))),
        Some(Raw::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Parse a Go-style duration such as `6h`, `1h30m`, `90s` or `250ms`.
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration {input:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit {unit:?} in duration {input:?}")),
        };
        total += value * scale;
        rest = &rest[unit_len..];
    }

    Duration::try_from_secs_f64(total).map_err(|_| format!("duration {input:?} is out of range"))
}

/// Inverse of [`parse_duration`] for whole-second and millisecond values.
pub fn format_duration(value: Duration) -> String {
    if value.subsec_nanos() != 0 {
        return format!("{}ms", value.as_millis());
    }

    let secs = value.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}
