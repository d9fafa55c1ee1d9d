//! Property tests for the sanitizer and trust check.

use inference_filter::security::{
    sanitize_header, sanitize_identity_tier, sanitize_identity_user, sanitize_label,
    validate_trusted_header,
};
use proptest::prelude::*;

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/')
}

fn is_header_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | ':' | '/')
}

proptest! {
    #[test]
    fn label_sanitize_is_idempotent(s in any::<String>()) {
        let once = sanitize_label(&s).value;
        let twice = sanitize_label(&once);
        prop_assert_eq!(&twice.value, &once);
        prop_assert!(!twice.modified);
    }

    #[test]
    fn header_sanitize_is_idempotent(s in any::<String>()) {
        let once = sanitize_header(&s).value;
        prop_assert_eq!(sanitize_header(&once).value, once);
    }

    #[test]
    fn header_output_has_no_controls(s in "(\\PC|[\\r\\n\\t\\x00\\x7f]){0,400}") {
        let out = sanitize_header(&s).value;
        prop_assert!(!out.chars().any(|c| c.is_control()));
        prop_assert!(out.chars().count() <= 256);
        prop_assert!(out.chars().all(is_header_char));
    }

    #[test]
    fn label_output_shape(s in any::<String>()) {
        let out = sanitize_label(&s).value;
        prop_assert!(out == "unknown" || out.chars().all(is_label_char));
        prop_assert!(!out.is_empty());
        prop_assert!(out.chars().count() <= 128);
    }

    #[test]
    fn identity_user_never_too_short(s in any::<String>()) {
        let out = sanitize_identity_user(&s).value;
        prop_assert!(out.len() >= 2);
    }

    #[test]
    fn identity_tier_never_empty(s in any::<String>()) {
        prop_assert!(!sanitize_identity_tier(&s).value.is_empty());
    }

    #[test]
    fn trust_rejects_injection_markers(
        prefix in "[a-z]{0,10}",
        marker in prop::sample::select(vec!["\r\n", "--", "DROP", "$(", "`"]),
        suffix in "[a-z]{0,10}",
    ) {
        let value = format!("{prefix}{marker}{suffix}");
        let decision = validate_trusted_header("x-auth-request-user", &value);
        prop_assert!(!decision.is_trusted());
        prop_assert!(!decision.reason().is_empty());
    }

    #[test]
    fn trust_accepts_plain_identifiers(s in "[a-z0-9][a-z0-9_.:]{1,60}") {
        // SQL keywords are rejected case-insensitively even inside words.
        prop_assume!(!["drop", "select", "insert", "update", "delete"]
            .iter()
            .any(|kw| s.contains(kw)));
        prop_assert!(validate_trusted_header("x-auth-request-user", &s).is_trusted());
    }
}
