//! Background worker that processes assistant exchanges serially.

use super::{AgentError, Exchange};
use embedded_assistant_client::AssistOutcome;
use tokio::sync::{mpsc, oneshot};
use tracing::error;

/// Result sender for prompt requests.
pub type ResultSender = oneshot::Sender<Result<AssistOutcome, AgentError>>;

/// A queued invocation.
pub struct PromptRequest {
    pub query: String,
    pub result_tx: ResultSender,
}

/// Background worker that owns the session and drains the request queue.
pub struct AssistWorker {
    exchange: Box<dyn Exchange>,
    input_rx: mpsc::Receiver<PromptRequest>,
}

impl AssistWorker {
    pub fn new(exchange: Box<dyn Exchange>, input_rx: mpsc::Receiver<PromptRequest>) -> Self {
        Self { exchange, input_rx }
    }

    /// Run the worker loop, processing requests one at a time until the
    /// queue closes.
    pub async fn run(mut self) {
        while let Some(request) = self.input_rx.recv().await {
            let result = self
                .exchange
                .exchange(&request.query)
                .await
                .map_err(AgentError::from);

            if let Err(err) = &result {
                error!("Assist exchange failed: {err}");
            }

            // Ignore send errors - the caller may have dropped the receiver
            let _ = request.result_tx.send(result);
        }
    }
}
