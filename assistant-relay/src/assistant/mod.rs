//! Assistant exchange integration.
//!
//! This module wraps the assistant session in a channel-fed background
//! worker. The session mutates its dialog state on every exchange, so all
//! invocations must be serialized against it; routing them through a single
//! worker task is what enforces that.

mod worker;

use embedded_assistant_client::{AssistError, AssistOutcome, TextAssistant};
use tokio::sync::{mpsc, oneshot};
use worker::{AssistWorker, PromptRequest};

/// Size of the request queue for the assistant worker.
const REQUEST_QUEUE_SIZE: usize = 16;

/// Error type for assistant operations at the relay level.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Request queue is full.
    #[error("request queue is full")]
    QueueFull,
    /// Worker has shut down.
    #[error("worker has shut down")]
    WorkerGone,
    /// The exchange itself failed.
    #[error(transparent)]
    Assist(#[from] AssistError),
}

/// One serialized exchange against the remote assistant.
///
/// Implemented by the real session; the worker only needs this seam.
#[async_trait::async_trait]
pub trait Exchange: Send {
    async fn exchange(&mut self, text_query: &str) -> Result<AssistOutcome, AssistError>;
}

#[async_trait::async_trait]
impl Exchange for TextAssistant {
    async fn exchange(&mut self, text_query: &str) -> Result<AssistOutcome, AssistError> {
        self.assist(text_query).await
    }
}

/// Assistant agent that processes queries via a background worker.
///
/// Requests are processed serially by the worker, which owns the session;
/// concurrent callers queue up rather than racing on the dialog state.
#[derive(Debug)]
pub struct AssistAgent {
    input_tx: mpsc::Sender<PromptRequest>,
    #[allow(dead_code)]
    worker_handle: tokio::task::JoinHandle<()>,
}

impl AssistAgent {
    /// Spawn the background worker around the given session.
    pub fn new(exchange: Box<dyn Exchange>) -> Self {
        let (input_tx, input_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);

        let worker = AssistWorker::new(exchange, input_rx);

        let worker_handle = tokio::spawn(async move {
            worker.run().await;
            tracing::info!("Assistant worker task exited");
        });

        Self {
            input_tx,
            worker_handle,
        }
    }

    /// Send a query and wait for the assistant's response.
    ///
    /// Returns `QueueFull` if too many invocations are already waiting.
    pub async fn request(&self, text_query: &str) -> Result<AssistOutcome, AgentError> {
        let (result_tx, result_rx) = oneshot::channel();

        self.input_tx
            .try_send(PromptRequest {
                query: text_query.to_owned(),
                result_tx,
            })
            .map_err(|_| AgentError::QueueFull)?;

        result_rx.await.map_err(|_| AgentError::WorkerGone)?
    }
}
