//! One tokio task per in-flight request.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::pipeline::processor::{Processor, RequestPipeline};
use crate::pipeline::protocol::{PhaseEvent, ProcessingResponse};

/// Drive one pipeline until the final response chunk is handled, the event
/// stream ends, or the receiver goes away.
///
/// Returns the number of events processed. Dropping either channel end
/// before completion aborts the request and drops its context.
pub async fn run_session(
    mut pipeline: RequestPipeline,
    mut events: mpsc::Receiver<PhaseEvent>,
    responses: mpsc::Sender<ProcessingResponse>,
) -> usize {
    let mut processed = 0;
    while let Some(event) = events.recv().await {
        let response = pipeline.handle(event);
        processed += 1;
        if responses.send(response).await.is_err() {
            tracing::debug!(
                request_id = pipeline.context().request_id(),
                "Response channel closed, abandoning request"
            );
            break;
        }
        if pipeline.is_complete() {
            break;
        }
    }
    if !pipeline.is_complete() {
        pipeline.abandon();
    }
    processed
}

/// Transport-side handle to a spawned session.
pub struct Session {
    events: mpsc::Sender<PhaseEvent>,
    responses: mpsc::Receiver<ProcessingResponse>,
    task: JoinHandle<usize>,
}

impl Session {
    pub fn spawn(processor: &Processor, buffer: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (response_tx, response_rx) = mpsc::channel(buffer);
        let task = tokio::spawn(run_session(processor.start_request(), event_rx, response_tx));
        Self {
            events: event_tx,
            responses: response_rx,
            task,
        }
    }

    /// Send one event and wait for its answer. `None` once the session ended.
    pub async fn process(&mut self, event: PhaseEvent) -> Option<ProcessingResponse> {
        self.events.send(event).await.ok()?;
        self.responses.recv().await
    }

    /// End the event stream and wait for the task.
    pub async fn finish(self) -> Result<usize, JoinError> {
        drop(self.events);
        self.task.await
    }
}
