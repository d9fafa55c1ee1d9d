//! Trust validation for identity headers.
//!
//! Identity headers are only supposed to be settable by the authenticating
//! gateway upstream of the filter. Network placement is the real defense;
//! this check rejects values that look like spoofing or injection attempts
//! before they reach labels, logs or billing records.

use std::fmt;

use crate::security::sanitize::{is_control, MAX_LABEL_LENGTH};

const SQL_PATTERNS: [&str; 11] = [
    "--", "/*", "*/", ";--", "';", "\"", "DROP", "SELECT", "INSERT", "UPDATE", "DELETE",
];

const SHELL_PATTERNS: [&str; 7] = ["&&", "||", "|", "`", "$", "$(", "${"];

/// Why a header value was not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustRejection {
    Empty,
    TooLong,
    Crlf,
    ControlCharacters,
    SqlPattern,
    ShellPattern,
}

impl TrustRejection {
    /// Short machine-readable code, used as a metric label.
    pub fn code(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::Crlf => "crlf",
            Self::ControlCharacters => "control_chars",
            Self::SqlPattern => "sql_pattern",
            Self::ShellPattern => "shell_pattern",
        }
    }

    /// Human-readable reason.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Empty => "empty header value",
            Self::TooLong => "header value exceeds maximum length",
            Self::Crlf => "header contains CRLF characters (injection attempt)",
            Self::ControlCharacters => "header contains control characters",
            Self::SqlPattern => "header contains suspicious SQL-like patterns",
            Self::ShellPattern => "header contains suspicious shell-like patterns",
        }
    }
}

impl fmt::Display for TrustRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Outcome of validating one identity header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    rejection: Option<TrustRejection>,
}

impl TrustDecision {
    const TRUSTED: Self = Self { rejection: None };

    fn rejected(rejection: TrustRejection) -> Self {
        Self {
            rejection: Some(rejection),
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.rejection.is_none()
    }

    pub fn rejection(&self) -> Option<TrustRejection> {
        self.rejection
    }

    /// Rejection reason, or the empty string when trusted.
    pub fn reason(&self) -> &'static str {
        self.rejection.map_or("", TrustRejection::reason)
    }
}

/// Check whether an identity header value looks like it came from the
/// trust boundary.
pub fn validate_trusted_header(header_name: &str, value: &str) -> TrustDecision {
    let decision = classify(value);
    if let Some(rejection) = decision.rejection {
        tracing::trace!(header = header_name, reason = rejection.code(), "Header failed trust check");
    }
    decision
}

fn classify(value: &str) -> TrustDecision {
    if value.is_empty() {
        return TrustDecision::rejected(TrustRejection::Empty);
    }
    if value.len() > MAX_LABEL_LENGTH {
        return TrustDecision::rejected(TrustRejection::TooLong);
    }
    if value.contains(['\r', '\n']) {
        return TrustDecision::rejected(TrustRejection::Crlf);
    }
    if value.chars().any(is_control) {
        return TrustDecision::rejected(TrustRejection::ControlCharacters);
    }
    if SQL_PATTERNS
        .iter()
        .any(|pattern| contains_ignore_ascii_case(value, pattern))
    {
        return TrustDecision::rejected(TrustRejection::SqlPattern);
    }
    if SHELL_PATTERNS.iter().any(|pattern| value.contains(pattern)) {
        return TrustDecision::rejected(TrustRejection::ShellPattern);
    }
    TrustDecision::TRUSTED
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "x-auth-request-user";

    fn rejection(value: &str) -> Option<TrustRejection> {
        validate_trusted_header(USER, value).rejection()
    }

    #[test]
    fn test_trusted_values() {
        for value in ["alice", "premium", "user-42", "team/a:b.c", "123e4567-e89b-12d3"] {
            let decision = validate_trusted_header(USER, value);
            assert!(decision.is_trusted(), "{value}");
            assert_eq!(decision.reason(), "");
        }
    }

    #[test]
    fn test_rejections() {
        assert_eq!(rejection(""), Some(TrustRejection::Empty));
        assert_eq!(rejection(&"a".repeat(129)), Some(TrustRejection::TooLong));
        assert_eq!(rejection(&"a".repeat(128)), None);
        assert_eq!(rejection("user\r\nmalicious"), Some(TrustRejection::Crlf));
        assert_eq!(rejection("user\nx"), Some(TrustRejection::Crlf));
        assert_eq!(rejection("user\x00malicious"), Some(TrustRejection::ControlCharacters));
        assert_eq!(rejection("user\x7f"), Some(TrustRejection::ControlCharacters));
        assert_eq!(rejection("user'; DROP TABLE users--"), Some(TrustRejection::SqlPattern));
        assert_eq!(
            rejection("user' OR '1'='1'; SELECT * FROM users"),
            Some(TrustRejection::SqlPattern)
        );
        assert_eq!(rejection("robert\""), Some(TrustRejection::SqlPattern));
        assert_eq!(rejection("user | cat /etc/passwd"), Some(TrustRejection::ShellPattern));
        assert_eq!(rejection("user$(whoami)"), Some(TrustRejection::ShellPattern));
        assert_eq!(rejection("user`whoami`"), Some(TrustRejection::ShellPattern));
        assert_eq!(rejection("a&&b"), Some(TrustRejection::ShellPattern));
    }

    #[test]
    fn test_sql_patterns_case_insensitive() {
        assert_eq!(rejection("drop"), Some(TrustRejection::SqlPattern));
        assert_eq!(rejection("sElEcT"), Some(TrustRejection::SqlPattern));
        // Substring match: a user literally named "dropbox" is rejected too.
        assert_eq!(rejection("dropbox"), Some(TrustRejection::SqlPattern));
    }

    #[test]
    fn test_reason_text() {
        let decision = validate_trusted_header(USER, "user$(whoami)");
        assert!(!decision.is_trusted());
        assert_eq!(decision.reason(), "header contains suspicious shell-like patterns");
        assert_eq!(
            TrustRejection::Crlf.to_string(),
            "header contains CRLF characters (injection attempt)"
        );
    }
}
