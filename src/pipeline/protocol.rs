//! Driving-protocol types.
//!
//! One [`PhaseEvent`] comes in per callback from the transport, one
//! [`ProcessingResponse`] goes back. Both serialize to JSON for replay scripts.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Read-only header access by name.
///
/// Implementations decide key matching; [`HeaderMap`] matches
/// case-insensitively in [`header`](Self::header) and exactly in
/// [`exact`](Self::exact).
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<&str>;

    /// Lookup on the key exactly as received. When a key repeats, the last
    /// occurrence wins. Used for trust-boundary headers.
    fn exact(&self, name: &str) -> Option<&str> {
        self.header(name)
    }
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered header list as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(HeaderEntry::new(key, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HeaderLookup for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(name))
            .map(|e| e.value.as_str())
    }

    fn exact(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == name)
            .map(|e| e.value.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| HeaderEntry::new(k, v))
                .collect(),
        }
    }
}

/// One callback from the driving protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseEvent {
    RequestHeaders {
        headers: HeaderMap,
    },
    RequestBody {
        #[serde(with = "body_text", default)]
        body: Bytes,
    },
    ResponseHeaders {
        headers: HeaderMap,
        #[serde(default)]
        status: Option<u16>,
    },
    ResponseBody {
        #[serde(with = "body_text", default)]
        body: Bytes,
        #[serde(default)]
        end_of_stream: bool,
    },
}

impl PhaseEvent {
    pub fn phase(&self) -> Phase {
        match self {
            Self::RequestHeaders { .. } => Phase::RequestHeaders,
            Self::RequestBody { .. } => Phase::RequestBody,
            Self::ResponseHeaders { .. } => Phase::ResponseHeaders,
            Self::ResponseBody { .. } => Phase::ResponseBody,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RequestHeaders,
    RequestBody,
    ResponseHeaders,
    ResponseBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Continue,
}

/// Body processing mode requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyMode {
    Streamed,
}

/// Answer to one phase event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub phase: Phase,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_headers: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_override: Option<BodyMode>,
}

impl ProcessingResponse {
    /// Continue without mutation.
    pub fn proceed(phase: Phase) -> Self {
        Self {
            phase,
            status: ResponseStatus::Continue,
            set_headers: Vec::new(),
            mode_override: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.set_headers
            .iter()
            .find(|h| h.key == name)
            .map(|h| h.value.as_str())
    }
}

/// Bodies travel as text in replay scripts.
mod body_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        String::deserialize(deserializer).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_lookup_ignores_case() {
        let headers: HeaderMap = [("X-Request-ID", "abc"), ("accept", "text/event-stream")]
            .into_iter()
            .collect();
        assert_eq!(headers.header("x-request-id"), Some("abc"));
        assert_eq!(headers.header("ACCEPT"), Some("text/event-stream"));
        assert_eq!(headers.header("missing"), None);
    }

    #[test]
    fn test_exact_lookup_is_case_sensitive_last_wins() {
        let headers: HeaderMap = [("X-User", "first"), ("x-user", "second"), ("x-user", "third")]
            .into_iter()
            .collect();
        assert_eq!(headers.exact("x-user"), Some("third"));
        assert_eq!(headers.exact("X-User"), Some("first"));
        assert_eq!(headers.exact("X-USER"), None);
        assert_eq!(headers.header("x-user"), Some("first"));
    }

    #[test]
    fn test_phase_event_json() {
        let line = r#"{"phase":"response_body","body":"{\"usage\":{}}","end_of_stream":true}"#;
        let event: PhaseEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.phase(), Phase::ResponseBody);
        match &event {
            PhaseEvent::ResponseBody { body, end_of_stream } => {
                assert_eq!(&body[..], b"{\"usage\":{}}");
                assert!(*end_of_stream);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let line = r#"{"phase":"request_headers","headers":[{"key":"a","value":"b"}]}"#;
        let event: PhaseEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event,
            PhaseEvent::RequestHeaders {
                headers: [("a", "b")].into_iter().collect()
            }
        );
    }

    #[test]
    fn test_response_serialization_skips_empty() {
        let json = serde_json::to_value(ProcessingResponse::proceed(Phase::RequestHeaders)).unwrap();
        assert_eq!(json["phase"], "request_headers");
        assert_eq!(json["status"], "continue");
        assert!(json.get("set_headers").is_none());
        assert!(json.get("mode_override").is_none());
    }
}
