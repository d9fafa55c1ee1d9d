//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::Arc;

use bytes::Bytes;
use inference_filter::config::parse_config;
use inference_filter::observability::{MemoryMetrics, MetricEvent};
use inference_filter::pipeline::{HeaderLookup, HeaderMap, PhaseEvent, Processor, RequestPipeline};
use inference_filter::ModeGate;

pub const IDENTITY_ALL_ON: &str = r#"
[identity_billing]
enabled = true

[identity_billing.metrics]
export_token_metrics = true
export_routing_metrics = true
export_cache_metrics = true
export_security_metrics = true

[identity_billing.headers]
export_routing = true
export_cache = true
prefix = "x-vsr-"
"#;

pub fn gate(raw: &str) -> ModeGate {
    ModeGate::from_config(&parse_config(raw).expect("test config parses"))
}

/// Processor recording into memory, plus the recorder.
pub fn processor(gate: ModeGate) -> (Processor, Arc<MemoryMetrics>) {
    let metrics = Arc::new(MemoryMetrics::new());
    (Processor::new(gate, metrics.clone()), metrics)
}

pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    pairs.iter().copied().collect()
}

pub fn usage_body(prompt: i64, completion: i64) -> Bytes {
    Bytes::from(format!(
        r#"{{"id":"cmpl-1","object":"chat.completion","usage":{{"prompt_tokens":{prompt},"completion_tokens":{completion}}}}}"#
    ))
}

pub fn chat_body(model: &str, question: &str) -> Bytes {
    Bytes::from(
        serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": question}],
        })
        .to_string(),
    )
}

/// Drive a buffered request through every phase. Returns the response-header
/// phase answer.
pub fn run_buffered(
    pipeline: &mut RequestPipeline,
    request_headers: HeaderMap,
    body: Bytes,
) -> inference_filter::pipeline::ProcessingResponse {
    pipeline.handle(PhaseEvent::RequestHeaders {
        headers: request_headers,
    });
    pipeline.handle(PhaseEvent::RequestBody {
        body: chat_body("llama-3-8b", "hello"),
    });
    let response = pipeline.handle(PhaseEvent::ResponseHeaders {
        headers: headers(&[("content-type", "application/json")]),
        status: Some(200),
    });
    pipeline.handle(PhaseEvent::ResponseBody {
        body,
        end_of_stream: true,
    });
    response
}

pub fn count(metrics: &MemoryMetrics, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
    metrics.count(predicate)
}

/// Header source that records every name looked up.
#[derive(Default)]
pub struct CountingHeaders {
    inner: HeaderMap,
    lookups: RefCell<Vec<String>>,
}

impl CountingHeaders {
    pub fn new(inner: HeaderMap) -> Self {
        Self {
            inner,
            lookups: RefCell::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

impl HeaderLookup for CountingHeaders {
    fn header(&self, name: &str) -> Option<&str> {
        self.lookups.borrow_mut().push(name.to_string());
        self.inner.header(name)
    }

    fn exact(&self, name: &str) -> Option<&str> {
        self.lookups.borrow_mut().push(name.to_string());
        self.inner.exact(name)
    }
}
