//! String sanitization for metric labels and response headers.
//!
//! Every function here is total: it never fails and never blocks. The worst
//! case for a label is the literal [`UNKNOWN`] placeholder.

use std::borrow::Cow;

/// Maximum length of a metric label value. Bounds label cardinality.
pub const MAX_LABEL_LENGTH: usize = 128;

/// Maximum length of an emitted response header value.
pub const MAX_HEADER_LENGTH: usize = 256;

/// Placeholder for values that sanitize to nothing.
pub const UNKNOWN: &str = "unknown";

/// Tiers the filter recognizes. Other tiers are accepted but flagged.
pub const KNOWN_TIERS: [&str; 6] = ["free", "basic", "premium", "enterprise", "trial", "unknown"];

/// A cleaned value and whether cleaning changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub value: String,
    pub modified: bool,
}

impl Sanitized {
    fn unknown() -> Self {
        Self {
            value: UNKNOWN.to_string(),
            modified: true,
        }
    }
}

/// Sanitize a value for use as a low-cardinality metric label.
///
/// Trims whitespace, truncates to [`MAX_LABEL_LENGTH`] characters and replaces
/// anything outside `[A-Za-z0-9_\-.:/]` with `_`. Inputs that end up empty or
/// all underscores collapse to [`UNKNOWN`].
pub fn sanitize_label(value: &str) -> Sanitized {
    if value.is_empty() {
        return Sanitized::unknown();
    }

    let trimmed = value.trim();
    let truncated = truncate_chars(trimmed, MAX_LABEL_LENGTH);
    let mut modified = truncated.len() != value.len();

    let mut cleaned = String::with_capacity(truncated.len());
    for c in truncated.chars() {
        if is_label_safe(c) {
            cleaned.push(c);
        } else {
            cleaned.push('_');
            modified = true;
        }
    }

    if cleaned.bytes().all(|b| b == b'_') {
        return Sanitized::unknown();
    }

    Sanitized {
        value: cleaned,
        modified,
    }
}

/// Sanitize a value for use as an outgoing response header value.
///
/// CR, LF and other control characters are removed before anything else so a
/// value can never split the response. The rest is trimmed, truncated to
/// [`MAX_HEADER_LENGTH`] characters and restricted to `[A-Za-z0-9 _\-.:/]`.
pub fn sanitize_header(value: &str) -> Sanitized {
    if value.is_empty() {
        return Sanitized {
            value: String::new(),
            modified: false,
        };
    }

    let stripped: Cow<'_, str> = if value.chars().any(is_control) {
        Cow::Owned(value.chars().filter(|c| !is_control(*c)).collect())
    } else {
        Cow::Borrowed(value)
    };

    // Trim again after truncation so a cut never leaves trailing blanks.
    let truncated = truncate_chars(stripped.trim(), MAX_HEADER_LENGTH).trim_end();

    let cleaned: String = truncated
        .chars()
        .map(|c| if is_header_safe(c) { c } else { '_' })
        .collect();
    let modified = cleaned != value;

    Sanitized {
        value: cleaned,
        modified,
    }
}

/// Sanitize a user identifier taken from a trust-boundary header.
///
/// Identifiers shorter than two characters are not meaningful and collapse to
/// [`UNKNOWN`].
pub fn sanitize_identity_user(user: &str) -> Sanitized {
    let sanitized = sanitize_label(user);
    if sanitized.value.len() < 2 {
        return Sanitized::unknown();
    }
    sanitized
}

/// Sanitize a tier taken from a trust-boundary header.
///
/// Tiers outside [`KNOWN_TIERS`] are kept as-is but reported as modified so the
/// caller can log them. The upstream gateway is authoritative for tiers.
pub fn sanitize_identity_tier(tier: &str) -> Sanitized {
    let mut sanitized = sanitize_label(tier);
    if !is_known_tier(&sanitized.value) {
        sanitized.modified = true;
    }
    sanitized
}

/// Case-insensitive membership in [`KNOWN_TIERS`].
pub fn is_known_tier(tier: &str) -> bool {
    KNOWN_TIERS.iter().any(|known| known.eq_ignore_ascii_case(tier))
}

pub(crate) fn is_control(c: char) -> bool {
    c <= '\u{1F}' || c == '\u{7F}'
}

fn is_label_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/')
}

fn is_header_safe(c: char) -> bool {
    is_label_safe(c) || c == ' '
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
