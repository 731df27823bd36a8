//! Secret and PII redaction for transcript-derived text.
//!
//! # Responsibility
//! - Replace credentials, tokens and emails with category placeholders.
//! - Normalize user home directory segments in paths.
//! - Report which detector categories fired without exposing matches.
//!
//! # Invariants
//! - `sanitize` is total: it always returns text, never an error.
//! - `sanitize(sanitize(x)) == sanitize(x)`; placeholders never re-match.
//! - Detectors run in a fixed order; the order is part of the contract.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

static MACOS_HOME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Users/[^/]+/").expect("valid macos home regex"));
static LINUX_HOME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/home/[^/]+/").expect("valid linux home regex"));

/// Detector category reported to the collaborator prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedactionCategory {
    PrivateKey,
    ApiKey,
    AwsAccessKeyId,
    GithubToken,
    SlackToken,
    Jwt,
    CredentialKv,
    Email,
}

impl RedactionCategory {
    /// All categories in detector order.
    pub const ALL: [RedactionCategory; 8] = [
        Self::PrivateKey,
        Self::ApiKey,
        Self::AwsAccessKeyId,
        Self::GithubToken,
        Self::SlackToken,
        Self::Jwt,
        Self::CredentialKv,
        Self::Email,
    ];

    /// Stable snake_case name used in prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrivateKey => "private_key",
            Self::ApiKey => "api_key",
            Self::AwsAccessKeyId => "aws_access_key_id",
            Self::GithubToken => "github_token",
            Self::SlackToken => "slack_token",
            Self::Jwt => "jwt",
            Self::CredentialKv => "credential_kv",
            Self::Email => "email",
        }
    }

    /// Replacement written in place of a match.
    ///
    /// `CredentialKv` keeps the key name, so its replacement carries a
    /// capture reference.
    pub fn replacement(self) -> &'static str {
        match self {
            Self::PrivateKey => "[REDACTED_PRIVATE_KEY]",
            Self::ApiKey => "[REDACTED_API_KEY]",
            Self::AwsAccessKeyId => "[REDACTED_AWS_ACCESS_KEY_ID]",
            Self::GithubToken => "[REDACTED_GITHUB_TOKEN]",
            Self::SlackToken => "[REDACTED_SLACK_TOKEN]",
            Self::Jwt => "[REDACTED_JWT]",
            Self::CredentialKv => "${1}=[REDACTED]",
            Self::Email => "[REDACTED_EMAIL]",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::PrivateKey => &PRIVATE_KEY_RE,
            Self::ApiKey => &API_KEY_RE,
            Self::AwsAccessKeyId => &AWS_ACCESS_KEY_RE,
            Self::GithubToken => &GITHUB_TOKEN_RE,
            Self::SlackToken => &SLACK_TOKEN_RE,
            Self::Jwt => &JWT_RE,
            Self::CredentialKv => &CREDENTIAL_KV_RE,
            Self::Email => &EMAIL_RE,
        }
    }
}

impl Display for RedactionCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static PRIVATE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-----BEGIN [A-Z0-9 ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z0-9 ]*PRIVATE KEY-----")
        .expect("valid private key regex")
});
static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsk-[A-Za-z0-9_-]{20,}\b").expect("valid api key regex"));
static AWS_ACCESS_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b").expect("valid aws key regex"));
static GITHUB_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgh[pousr]_[A-Za-z0-9]{20,}\b").expect("valid github regex"));
static SLACK_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b").expect("valid slack regex"));
static JWT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b").expect("valid jwt regex")
});
static CREDENTIAL_KV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(api[_-]?key|token|secret|password|passwd|passphrase)\b\s*[:=]\s*([^\s,;]+)")
        .expect("valid credential regex")
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

/// Removes secrets and PII from `text`.
///
/// Home directory segments are normalized first, then every detector in
/// [`RedactionCategory::ALL`] order replaces its matches.
pub fn sanitize(text: &str) -> String {
    let mut sanitized = MACOS_HOME_RE
        .replace_all(text, "/Users/<user>/")
        .into_owned();
    sanitized = LINUX_HOME_RE
        .replace_all(&sanitized, "/home/<user>/")
        .into_owned();
    for category in RedactionCategory::ALL {
        sanitized = category
            .pattern()
            .replace_all(&sanitized, category.replacement())
            .into_owned();
    }
    sanitized
}

/// Returns the detector categories that match anywhere in `text`.
pub fn detect_categories(text: &str) -> BTreeSet<RedactionCategory> {
    RedactionCategory::ALL
        .into_iter()
        .filter(|category| category.pattern().is_match(text))
        .collect()
}

/// Renders detected categories as a prompt-friendly list.
pub fn describe_categories(categories: &BTreeSet<RedactionCategory>) -> String {
    if categories.is_empty() {
        return "none detected".to_string();
    }
    categories
        .iter()
        .map(|category| category.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
