//! Relay between the hub and the assistant service.
//!
//! The relay owns one assistant session for the process lifetime and exposes
//! it as a single HTTP operation: `POST /assist` with a text query. All
//! invocations funnel through a background worker so only one exchange is in
//! flight at a time, and an optional response event is fired back onto the
//! hub's bus after each successful call.

use crate::assistant::{AgentError, AssistAgent};
use crate::events::{EventBus, EventBusConfig, EventPayload};
use conf::Conf;
use embedded_assistant_client::{
    Authenticator, CredentialError, SessionConfig, TextAssistant,
};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::{bytes::Buf, sync::CancellationToken};
use tracing::{error, info, warn};

/// Configuration for the relay.
#[derive(Conf, Debug)]
pub struct RelayConfig {
    /// Path to the OAuth2 credentials file for the assistant API.
    #[conf(long, env, default_value = "credentials.json")]
    pub credentials: PathBuf,
    /// Identifier of the device model registered with the assistant API.
    #[conf(long, env, default_value = "test_device_model_id")]
    pub device_model_id: String,
    /// Identifier of the registered device instance.
    #[conf(long, env, default_value = "test_device_id")]
    pub device_id: String,
    /// Language for conversations (BCP-47).
    #[conf(long, env, default_value = "en-US")]
    pub language: String,
    /// Deadline in seconds for each assist call.
    #[conf(long, env, default_value = "10")]
    pub grpc_deadline: u64,
    /// Request visual (HTML) responses from the assistant.
    #[conf(long)]
    pub display: bool,
    /// Hub event API configuration. Without it, response events are only logged.
    #[conf(flatten)]
    pub events: Option<EventBusConfig>,
}

/// Error type for relay construction.
///
/// Any of these aborts startup: the relay must not come up reachable
/// without a working credential.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Loading the assistant credential failed.
    #[error("assistant credentials: {0}")]
    Credential(#[from] CredentialError),
    /// Setting up the hub event bus failed.
    #[error("hub event bus: {0}")]
    Events(#[from] crate::events::EventBusError),
}

/// Body of `POST /assist`.
#[derive(Debug, Deserialize)]
pub struct AssistPost {
    /// The text query to send to the assistant.
    pub query: String,
    /// If present, an event with this name is fired on the hub bus after a
    /// successful exchange.
    #[serde(default)]
    pub response_event: Option<String>,
}

/// Body of a successful `POST /assist` response.
#[derive(Debug, Serialize)]
pub struct AssistReply {
    pub query: String,
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_html: Option<String>,
}

/// The relay bridges the hub's HTTP invocations to the assistant session.
#[derive(Debug)]
pub struct Relay {
    agent: AssistAgent,
    events: Option<EventBus>,
    token: CancellationToken,
}

impl Relay {
    /// Create a new relay with the given configuration.
    ///
    /// Loads the credential bundle; failure here is fatal and should abort
    /// startup before the listener is bound.
    pub fn new(config: RelayConfig, token: CancellationToken) -> Result<Self, RelayError> {
        let authenticator = Authenticator::from_file(&config.credentials)?;

        let session = TextAssistant::new(
            SessionConfig {
                language_code: config.language,
                device_model_id: config.device_model_id,
                device_id: config.device_id,
                display: config.display,
                deadline: Duration::from_secs(config.grpc_deadline),
            },
            authenticator,
        );

        let events = config.events.as_ref().map(EventBus::new).transpose()?;

        Ok(Self {
            agent: AssistAgent::new(Box::new(session)),
            events,
            token,
        })
    }

    /// Run until shutdown is requested.
    ///
    /// The relay is request-driven; this just parks on the cancellation
    /// token so the binary can block on it.
    pub async fn run(&self) {
        self.token.cancelled().await;
        info!("Relay stopped");
    }

    /// Handle an incoming HTTP request.
    pub async fn handle_http_request<B>(&self, req: Request<B>) -> Result<Response<String>, String>
    where
        B: Body + Send,
        B::Data: Buf + Send,
        B::Error: std::fmt::Display,
    {
        info!(
            "Received http request: {} {} (version: {:?})",
            req.method(),
            req.uri().path(),
            req.version()
        );

        fn err_resp(code: StatusCode, text: impl Into<String>) -> Response<String> {
            let mut resp = Response::new(text.into());
            *resp.status_mut() = code;
            resp
        }

        match req.uri().path() {
            "/" | "/health" | "/ready" => {
                if !matches!(req.method(), &Method::GET | &Method::HEAD) {
                    Ok(err_resp(
                        StatusCode::NOT_IMPLEMENTED,
                        "Use GET or HEAD with this route",
                    ))
                } else {
                    Ok(Response::new("OK".into()))
                }
            }
            "/assist" => {
                if !matches!(req.method(), &Method::POST) {
                    return Ok(err_resp(
                        StatusCode::NOT_IMPLEMENTED,
                        "Use POST with this route",
                    ));
                }
                let body_bytes = req
                    .into_body()
                    .collect()
                    .await
                    .map_err(|err| format!("When reading body bytes: {err}"))?
                    .to_bytes()
                    .to_vec();

                match self.handle_post_assist(&body_bytes).await {
                    Ok(reply_json) => {
                        let mut resp = Response::new(reply_json);
                        resp.headers_mut().insert(
                            http::header::CONTENT_TYPE,
                            http::HeaderValue::from_static("application/json"),
                        );
                        Ok(resp)
                    }
                    Err((code, msg)) => Ok(err_resp(code, msg)),
                }
            }
            _ => Ok(err_resp(
                StatusCode::NOT_FOUND,
                format!("Not found '{} {}'", req.method(), req.uri().path()),
            )),
        }
    }

    /// Handle the body of `POST /assist`: run one exchange, fire the
    /// response event if one was requested, and shape the reply.
    async fn handle_post_assist(
        &self,
        body_bytes: &[u8],
    ) -> Result<String, (StatusCode, String)> {
        let body_text = str::from_utf8(body_bytes).map_err(|err| {
            warn!("When reading body bytes: {err}");
            (
                StatusCode::BAD_REQUEST,
                "Request body was not utf-8".to_owned(),
            )
        })?;

        let post: AssistPost = serde_json::from_str(body_text).map_err(|err| {
            error!("Could not parse json: {err}:\n{body_text}");
            (StatusCode::BAD_REQUEST, "Invalid Json".to_owned())
        })?;

        let outcome = self.agent.request(&post.query).await.map_err(|err| {
            error!("Assist request failed: {err}");
            (agent_error_status(&err), err.to_string())
        })?;

        if let Some(text) = &outcome.text {
            info!("Assistant: {text}");
        }

        if let Some(event_name) = &post.response_event {
            if let Some(events) = &self.events {
                let payload = EventPayload {
                    query: &post.query,
                    response: outcome.text.as_deref(),
                };
                // The exchange already succeeded; a publish failure is this
                // invocation's problem to log, not to fail.
                if let Err(err) = events.fire(event_name, &payload).await {
                    error!("Could not fire event {event_name}: {err}");
                }
            } else {
                warn!("response_event {event_name} requested but no hub api is configured");
            }
        }

        let reply = AssistReply {
            query: post.query,
            response: outcome.text,
            response_html: outcome
                .html
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        };

        serde_json::to_string(&reply)
            .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
    }
}

/// Map agent errors to response status codes.
fn agent_error_status(err: &AgentError) -> StatusCode {
    match err {
        AgentError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        AgentError::WorkerGone => StatusCode::INTERNAL_SERVER_ERROR,
        AgentError::Assist(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assist_post_parsing() {
        let post: AssistPost =
            serde_json::from_str(r#"{"query": "turn on the light"}"#).unwrap();
        assert_eq!(post.query, "turn on the light");
        assert!(post.response_event.is_none());

        let post: AssistPost = serde_json::from_str(
            r#"{"query": "what time is it", "response_event": "assistant_response"}"#,
        )
        .unwrap();
        assert_eq!(post.response_event.as_deref(), Some("assistant_response"));

        // Empty queries are valid; the assistant accepts them.
        let post: AssistPost = serde_json::from_str(r#"{"query": ""}"#).unwrap();
        assert_eq!(post.query, "");

        assert!(serde_json::from_str::<AssistPost>(r#"{"response_event": "x"}"#).is_err());
    }

    #[test]
    fn test_assist_reply_shape() {
        let reply = AssistReply {
            query: "hi".into(),
            response: Some("Hello!".into()),
            response_html: None,
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["response"], "Hello!");
        // Absent html is omitted entirely rather than serialized as null.
        assert!(json.get("response_html").is_none());

        let reply = AssistReply {
            query: "hi".into(),
            response: None,
            response_html: Some("<p>Hello!</p>".into()),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json["response"].is_null());
        assert_eq!(json["response_html"], "<p>Hello!</p>");
    }

    #[test]
    fn test_missing_credentials_abort_relay_construction() {
        let config = RelayConfig {
            credentials: PathBuf::from("/nonexistent/credentials.json"),
            device_model_id: "test_device_model_id".into(),
            device_id: "test_device_id".into(),
            language: "en-US".into(),
            grpc_deadline: 10,
            display: false,
            events: None,
        };

        let err = Relay::new(config, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, RelayError::Credential(_)));
    }

    #[test]
    fn test_agent_error_status_mapping() {
        assert_eq!(
            agent_error_status(&AgentError::QueueFull),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            agent_error_status(&AgentError::WorkerGone),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
