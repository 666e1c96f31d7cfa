//! Configuration validation.
//!
//! # Responsibilities
//! - Domain pattern and target URL syntax
//! - Path / preserve-path conflicts
//! - Wildcard arity between `from` and `to`
//! - Credential completeness, duplicate usernames, unknown groups, mixed realms
//! - Refresh domain syntax
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ConfigDocument → Result<(), Vec<ValidationError>>
//! - Runs before a document is resolved into a snapshot

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::config::schema::{ConfigDocument, DEFAULT_REALM};
use crate::routing::matcher::host_labels;
use crate::routing::resolver::UrlTemplate;

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9_-]+|\*)(?:\.(?:[a-zA-Z0-9_-]+|\*))+(?::(?:\d+|\*))?$")
        .expect("domain pattern regex")
});

static TARGET_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+://(?:[a-zA-Z0-9_-]+|\*)(?:\.(?:[a-zA-Z0-9_-]+|\*))+(?::\d+)?(?:/[^/]*)*$")
        .expect("target url regex")
});

static HAS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+//.+(?:/[^/]*)+$").expect("has-path regex"));

/// A single semantic problem found in a config document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid \"from\" domain [#{index}]: {value}")]
    InvalidFrom { index: usize, value: String },

    #[error("invalid \"to\" URL [#{index}]: {value}")]
    InvalidTo { index: usize, value: String },

    #[error("\"to\" URL cannot contain a path when preserve-path is set [#{index}]: {value}")]
    PathWithPreservePath { index: usize, value: String },

    #[error("\"to\" has wildcard(s) but its sections ({to_sections}) and \"from\" sections ({from_sections}) differ [#{index}]")]
    WildcardArity {
        index: usize,
        to_sections: usize,
        from_sections: usize,
    },

    #[error("auth \"username\" must be provided [@basic-auth {group:?} #{index}]")]
    MissingUsername { group: String, index: usize },

    #[error("auth \"password\" must be provided [@basic-auth {group:?} #{index}]")]
    MissingPassword { group: String, index: usize },

    #[error("duplicate username {username:?} in basic-auth at: {}", .locations.join(", "))]
    DuplicateUsername {
        username: String,
        locations: Vec<String>,
    },

    #[error("auth {name:?} not found [@redirect #{index}]")]
    UnknownCredentialGroup { index: usize, name: String },

    #[error("mixed realms ({}) at redirect #{index}; all linked auths must share one realm", .realms.join(", "))]
    MixedRealms { index: usize, realms: Vec<String> },

    #[error("invalid \"domain\" for refresh domains [#{index}]: {value}")]
    InvalidRefreshDomain { index: usize, value: String },
}

/// Whether `value` is a syntactically valid domain pattern.
pub fn is_domain_pattern(value: &str) -> bool {
    DOMAIN_PATTERN.is_match(value)
}

/// Whether `value` is a syntactically valid absolute redirect target.
pub fn is_target_url(value: &str) -> bool {
    if !TARGET_URL.is_match(value) {
        return false;
    }
    // The regex fixes the shape; the URL parser has the final word.
    url::Url::parse(&value.replace('*', "wildcard"))
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Validate a document, collecting every violation.
pub fn validate_document(document: &ConfigDocument) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let groups = document
        .auth
        .as_ref()
        .map(|auth| &auth.basic_auth)
        .cloned()
        .unwrap_or_default();

    // Each user needs both halves of the credential
    for (name, group) in &groups {
        for (index, user) in group.users.iter().enumerate() {
            if user.username.is_empty() {
                errors.push(ValidationError::MissingUsername {
                    group: name.clone(),
                    index,
                });
            }
            if user.password.is_empty() {
                errors.push(ValidationError::MissingPassword {
                    group: name.clone(),
                    index,
                });
            }
        }
    }

    // Usernames are unique within and across groups
    let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, group) in &groups {
        for (index, user) in group.users.iter().enumerate() {
            if user.username.is_empty() {
                continue;
            }
            seen.entry(user.username.as_str())
                .or_default()
                .push(format!("{name:?} [#{index}]"));
        }
    }
    for (username, locations) in seen {
        if locations.len() > 1 {
            errors.push(ValidationError::DuplicateUsername {
                username: username.to_string(),
                locations,
            });
        }
    }

    for (index, redirect) in document.redirects.iter().enumerate() {
        let from_valid = is_domain_pattern(&redirect.from);
        if !from_valid {
            errors.push(ValidationError::InvalidFrom {
                index,
                value: redirect.from.clone(),
            });
        }

        let to_valid = is_target_url(&redirect.to);
        if !to_valid {
            errors.push(ValidationError::InvalidTo {
                index,
                value: redirect.to.clone(),
            });
        }

        if redirect.preserve_path && HAS_PATH.is_match(&redirect.to) {
            errors.push(ValidationError::PathWithPreservePath {
                index,
                value: redirect.to.clone(),
            });
        }

        if let (true, Some(target)) = (from_valid && to_valid, UrlTemplate::parse(&redirect.to)) {
            let from_sections = host_labels(&redirect.from).count();
            if target.has_wildcards() && target.label_count() != from_sections {
                errors.push(ValidationError::WildcardArity {
                    index,
                    to_sections: target.label_count(),
                    from_sections,
                });
            }
        }

        if !redirect.auth.is_empty() {
            let mut realms = BTreeSet::new();
            for name in &redirect.auth {
                match groups.get(name) {
                    Some(group) => {
                        let realm = group
                            .realm
                            .as_deref()
                            .filter(|realm| !realm.is_empty())
                            .unwrap_or(DEFAULT_REALM);
                        realms.insert(realm.to_string());
                    }
                    None => errors.push(ValidationError::UnknownCredentialGroup {
                        index,
                        name: name.clone(),
                    }),
                }
            }

            if realms.len() > 1 {
                errors.push(ValidationError::MixedRealms {
                    index,
                    realms: realms.into_iter().map(|realm| format!("{realm:?}")).collect(),
                });
            }
        }
    }

    if let Some(refresh) = &document.url_config_refresh {
        for (index, domain) in refresh.refresh_domains.iter().enumerate() {
            if !is_domain_pattern(&domain.domain) {
                errors.push(ValidationError::InvalidRefreshDomain {
                    index,
                    value: domain.domain.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
