//! Domain matching logic.
//!
//! # Responsibilities
//! - Split `host[:port]` into labels and an optional port
//! - Select the first candidate whose pattern matches a host
//!
//! # Design Decisions
//! - Exact patterns always outrank wildcard patterns, whatever their position
//! - Two full passes (exact, then wildcard) instead of a ranked single pass
//! - Host labels compare ASCII case-insensitively
//! - A `*` label matches exactly one label; label counts must be equal
//! - A pattern without a port matches any port; `*` as port matches any port
//! - No regex in the hot path

/// Split `host[:port]` into the name and the port text, if any.
///
/// Bracketed IPv6 literals keep their inner colons.
pub fn split_port(host: &str) -> (&str, Option<&str>) {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') || name.ends_with(']') => (name, Some(port)),
        _ => (host, None),
    }
}

/// The dot-separated labels of a host or pattern, port excluded.
pub fn host_labels(host: &str) -> std::str::Split<'_, char> {
    let (name, _) = split_port(host);
    name.strip_suffix('.').unwrap_or(name).split('.')
}

/// Return the index of the first candidate matching `host`.
///
/// Pass 1 considers only patterns without wildcards; pass 2 considers only
/// wildcard patterns. Both passes scan in candidate order.
pub fn match_domain<T, F>(host: &str, candidates: &[T], pattern_of: F) -> Option<usize>
where
    F: Fn(&T) -> &str,
{
    let host = host.trim();
    let (_, host_port) = split_port(host);

    let exact = candidates.iter().position(|candidate| {
        let pattern = pattern_of(candidate);
        !pattern.contains('*') && matches_exact(pattern, host, host_port)
    });
    if exact.is_some() {
        return exact;
    }

    candidates.iter().position(|candidate| {
        let pattern = pattern_of(candidate);
        pattern.contains('*') && matches_wildcard(pattern, host, host_port)
    })
}

fn matches_exact(pattern: &str, host: &str, host_port: Option<&str>) -> bool {
    let (_, pattern_port) = split_port(pattern);
    normalized_name(pattern).eq_ignore_ascii_case(normalized_name(host))
        && port_matches(pattern_port, host_port)
}

fn matches_wildcard(pattern: &str, host: &str, host_port: Option<&str>) -> bool {
    let (_, pattern_port) = split_port(pattern);
    if !port_matches(pattern_port, host_port) {
        return false;
    }

    let mut pattern_labels = host_labels(pattern);
    let mut labels = host_labels(host);
    loop {
        match (pattern_labels.next(), labels.next()) {
            (None, None) => return true,
            (Some(expected), Some(label)) => {
                if expected != "*" && !expected.eq_ignore_ascii_case(label) {
                    return false;
                }
            }
            // Label counts differ
            _ => return false,
        }
    }
}

fn normalized_name(host: &str) -> &str {
    let (name, _) = split_port(host);
    name.strip_suffix('.').unwrap_or(name)
}

fn port_matches(pattern_port: Option<&str>, host_port: Option<&str>) -> bool {
    match pattern_port {
        None | Some("*") => true,
        Some(expected) => host_port == Some(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(host: &str, patterns: &[&str]) -> Option<usize> {
        match_domain(host, patterns, |p| p)
    }

    #[test]
    fn wildcard_matches_single_label() {
        let patterns = ["*.example.com"];
        assert_eq!(first("a.example.com", &patterns), Some(0));
        assert_eq!(first("b.example.com", &patterns), Some(0));
        assert_eq!(first("example.com", &patterns), None);
        assert_eq!(first("a.b.example.com", &patterns), None);
    }

    #[test]
    fn exact_outranks_earlier_wildcard() {
        assert_eq!(
            first("exact.example.com", &["exact.example.com", "*.example.com"]),
            Some(0)
        );
        assert_eq!(
            first("exact.example.com", &["*.example.com", "exact.example.com"]),
            Some(1)
        );
    }

    #[test]
    fn first_wildcard_in_order_wins() {
        assert_eq!(first("a.b.com", &["*.b.com", "a.*.com", "*.*.*"]), Some(0));
        assert_eq!(first("x.b.com", &["a.*.com", "*.*.*", "*.b.com"]), Some(1));
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(first("other.org", &["example.com", "*.example.com"]), None);
        assert_eq!(first("a.com", &[] as &[&str]), None);
    }

    #[test]
    fn host_port_is_ignored_by_portless_patterns() {
        assert_eq!(first("example.com:8080", &["example.com"]), Some(0));
        assert_eq!(first("a.example.com:8080", &["*.example.com"]), Some(0));
    }

    #[test]
    fn pattern_ports_are_compared() {
        assert_eq!(first("example.com:8080", &["example.com:8080"]), Some(0));
        assert_eq!(first("example.com:9090", &["example.com:8080"]), None);
        assert_eq!(first("example.com", &["example.com:8080"]), None);
        assert_eq!(first("example.com:9090", &["example.com:*"]), Some(0));
        assert_eq!(first("a.example.com:1", &["*.example.com:*"]), Some(0));
    }

    #[test]
    fn exact_port_outranks_wildcard_port() {
        assert_eq!(
            first("example.com:8080", &["example.com:*", "example.com:8080"]),
            Some(1)
        );
    }

    #[test]
    fn case_and_trailing_dot_are_normalized() {
        assert_eq!(first("EXAMPLE.com", &["example.com"]), Some(0));
        assert_eq!(first("example.com.", &["example.com"]), Some(0));
        assert_eq!(first("A.Example.COM", &["*.example.com"]), Some(0));
    }

    #[test]
    fn works_with_arbitrary_candidates() {
        struct Entry {
            pattern: String,
        }
        let entries = vec![
            Entry { pattern: "*.io".into() },
            Entry { pattern: "docs.rs".into() },
        ];
        assert_eq!(match_domain("docs.rs", &entries, |e| e.pattern.as_str()), Some(1));
        assert_eq!(match_domain("tokio.io", &entries, |e| e.pattern.as_str()), Some(0));
    }

    #[test]
    fn splits_ports() {
        assert_eq!(split_port("a.com:80"), ("a.com", Some("80")));
        assert_eq!(split_port("a.com"), ("a.com", None));
        assert_eq!(split_port("[::1]:80"), ("[::1]", Some("80")));
        assert_eq!(split_port("::1"), ("::1", None));
        assert_eq!(host_labels("a.b.com:80").collect::<Vec<_>>(), vec!["a", "b", "com"]);
    }
}
