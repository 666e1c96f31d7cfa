//! Credential verification for protected redirects.
//!
//! Presented credentials are hashed with SHA-256 and compared against the
//! stored digests with `subtle`, scanning every user of every referenced
//! group without an early exit.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

use crate::config::schema::RedirectRule;

/// Credentials presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an `Authorization: Basic <base64(user:password)>` header value.
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;

        // Passwords may contain ':'
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }
}

/// Whether `presented` grants access to `rule`.
///
/// Rules without credential groups are always authorized.
pub fn authorize(rule: &RedirectRule, presented: Option<&Credentials>) -> bool {
    if !rule.requires_auth() {
        return true;
    }

    let Some(presented) = presented else {
        return false;
    };

    let (granted, compared) = compare_all(rule, presented);
    tracing::trace!(compared, "Checked presented credentials");
    granted.into()
}

/// Compare `presented` against every user of every referenced group.
///
/// Both sides are fixed-length digests and the scan never exits early, so
/// the work done depends on the rule alone, not on how close the presented
/// password is. Returns the result and the number of users compared.
fn compare_all(rule: &RedirectRule, presented: &Credentials) -> (Choice, usize) {
    let username_digest: [u8; 32] = Sha256::digest(presented.username.as_bytes()).into();
    let password_digest: [u8; 32] = Sha256::digest(presented.password.as_bytes()).into();

    let mut granted = Choice::from(0u8);
    let mut compared = 0;
    for group in rule.credential_groups() {
        for user in &group.users {
            let same_user = user.username_digest()[..].ct_eq(&username_digest[..]);
            let same_password = user.password_digest()[..].ct_eq(&password_digest[..]);
            granted |= same_user & same_password;
            compared += 1;
        }
    }

    (granted, compared)
}

/// `WWW-Authenticate` challenge value for a protected rule.
pub fn challenge(rule: &RedirectRule) -> String {
    format!(
        "Basic realm=\"{}\", charset=\"UTF-8\"",
        rule.realm().unwrap_or(crate::config::schema::DEFAULT_REALM)
    )
}
