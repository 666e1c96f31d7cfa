//! Redirect target resolution.
//!
//! # Responsibilities
//! - Pre-parse each rule's `to` template once, at snapshot build time
//! - Substitute `*` host labels with the request's labels, by position
//! - Preserve the request path when the rule asks for it
//! - Pick the redirect status (307 temporary / 308 permanent)

use axum::http::StatusCode;

use crate::config::schema::RedirectRule;
use crate::routing::matcher::{host_labels, split_port};

/// A parsed `scheme://host[:port][/path]` redirect template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTemplate {
    scheme: String,
    host_labels: Vec<String>,
    port: Option<String>,
    path: String,
}

impl UrlTemplate {
    /// Parse a template. Returns `None` if it has no scheme or host.
    pub fn parse(template: &str) -> Option<Self> {
        let (scheme, rest) = template.split_once("://")?;
        let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, path) = rest.split_at(authority_len);
        let (name, port) = split_port(authority);

        if scheme.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self {
            scheme: scheme.to_string(),
            host_labels: name.split('.').map(str::to_string).collect(),
            port: port.map(str::to_string),
            path: path.to_string(),
        })
    }

    pub fn has_wildcards(&self) -> bool {
        self.host_labels.iter().any(|label| label == "*")
    }

    /// Number of host labels, used for the wildcard arity check.
    pub fn label_count(&self) -> usize {
        self.host_labels.len()
    }

    /// The template's own path (empty when it has none).
    pub fn path(&self) -> &str {
        &self.path
    }

    fn write_authority(&self, request_host: &str, out: &mut String) {
        let request_labels: Vec<&str> = host_labels(request_host).collect();
        for (index, label) in self.host_labels.iter().enumerate() {
            if index > 0 {
                out.push('.');
            }
            if label == "*" {
                // Arity is guaranteed by validation for hosts the rule matched
                out.push_str(request_labels.get(index).copied().unwrap_or("*"));
            } else {
                out.push_str(label);
            }
        }
        if let Some(port) = &self.port {
            out.push(':');
            out.push_str(port);
        }
    }
}

/// Compute the absolute redirect URL for a matched rule.
pub fn resolve(rule: &RedirectRule, request_host: &str, request_path: &str) -> String {
    let target = rule.target();

    let mut location = String::with_capacity(rule.to.len() + request_path.len());
    location.push_str(&target.scheme);
    location.push_str("://");
    target.write_authority(request_host, &mut location);

    if rule.preserve_path {
        if !request_path.is_empty() && !request_path.starts_with('/') {
            location.push('/');
        }
        location.push_str(request_path);
    } else {
        location.push_str(&target.path);
    }

    location
}

/// 307 for temporary redirects, 308 for permanent ones.
pub fn redirect_status(rule: &RedirectRule) -> StatusCode {
    if rule.temp_redirect {
        StatusCode::TEMPORARY_REDIRECT
    } else {
        StatusCode::PERMANENT_REDIRECT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ConfigDocument, Origin, RuleSet, SourceKind};

    fn rule(yaml_rule: &str) -> std::sync::Arc<RedirectRule> {
        let yaml = format!("redirects:\n  - {yaml_rule}\n");
        let document = ConfigDocument::from_yaml(yaml.as_bytes()).unwrap();
        let origin = Origin {
            source: SourceKind::File,
            location: String::new(),
            loaded_at: chrono::Utc::now(),
        };
        RuleSet::from_document(document, origin).unwrap().rules[0].clone()
    }

    #[test]
    fn substitutes_wildcards_and_drops_path() {
        let r = rule(r#"{ from: "*.old.com", to: "https://*.new.com" }"#);
        assert_eq!(resolve(&r, "abc.old.com", "/x"), "https://abc.new.com");
    }

    #[test]
    fn preserves_path() {
        let r = rule(r#"{ from: a.com, to: "https://b.com", preserve-path: true }"#);
        assert_eq!(resolve(&r, "a.com", "/some-path"), "https://b.com/some-path");
    }

    #[test]
    fn template_path_used_verbatim_without_preserve() {
        let r = rule(r#"{ from: a.com, to: "https://b.com/landing" }"#);
        assert_eq!(resolve(&r, "a.com", "/ignored"), "https://b.com/landing");
    }

    #[test]
    fn multiple_wildcards_keep_position() {
        let r = rule(r#"{ from: "*.*.example.com", to: "https://a.*.*.com" }"#);
        assert_eq!(resolve(&r, "x.y.example.com", "/"), "https://a.y.example.com");
    }

    #[test]
    fn request_port_is_not_carried_into_target() {
        let r = rule(r#"{ from: "*.old.com", to: "https://*.new.com:8443", preserve-path: true }"#);
        assert_eq!(
            resolve(&r, "abc.old.com:8080", "/p"),
            "https://abc.new.com:8443/p"
        );
    }

    #[test]
    fn status_follows_temp_redirect() {
        let temp = rule(r#"{ from: a.com, to: "https://b.com" }"#);
        assert_eq!(redirect_status(&temp), StatusCode::TEMPORARY_REDIRECT);

        let permanent = rule(r#"{ from: a.com, to: "https://b.com", temp-redirect: false }"#);
        assert_eq!(redirect_status(&permanent), StatusCode::PERMANENT_REDIRECT);
    }

    #[test]
    fn parses_templates() {
        let template = UrlTemplate::parse("https://*.new.com:8443/base").unwrap();
        assert!(template.has_wildcards());
        assert_eq!(template.label_count(), 3);
        assert_eq!(template.path(), "/base");
        assert!(UrlTemplate::parse("no-scheme.com").is_none());
    }
}
