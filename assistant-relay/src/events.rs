//! Event publication back to the hub.
//!
//! When an invocation names a `response_event`, the relay fires that event
//! on the hub's bus through its HTTP API (`POST /api/events/{event}`), with
//! the query and the assistant's text response as the payload.

use conf::Conf;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Configuration for publishing events to the hub.
#[derive(Clone, Conf, Debug)]
pub struct EventBusConfig {
    /// Base URL of the hub's HTTP API (e.g. http://homeassistant.local:8123/).
    #[conf(long, env)]
    pub hub_api_url: Url,
    /// Path to file containing a bearer token for the hub API.
    #[conf(long, env)]
    pub hub_token_file: Option<PathBuf>,
}

/// Error type for event publication.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// Failed to read the hub token file.
    #[error("failed to read hub token file: {0}")]
    TokenRead(std::io::Error),
    /// The event name is not usable as a single path segment.
    #[error("invalid event name: {0:?}")]
    EventName(Box<str>),
    /// The event URL could not be formed.
    #[error("event url: {0}")]
    Url(#[from] url::ParseError),
    /// HTTP request failed.
    #[error("event post failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The hub rejected the event.
    #[error("hub rejected event ({0}): {1}")]
    Rejected(u16, Box<str>),
}

/// Payload fired with a response event.
#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    pub query: &'a str,
    pub response: Option<&'a str>,
}

/// Publishes events on the hub's bus via its HTTP API.
#[derive(Debug)]
pub struct EventBus {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl EventBus {
    /// Create a new event bus client from configuration.
    ///
    /// Reads the bearer token from the configured file, if any.
    pub fn new(config: &EventBusConfig) -> Result<Self, EventBusError> {
        let token = config
            .hub_token_file
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .map(|text| text.trim().to_owned())
                    .map_err(EventBusError::TokenRead)
            })
            .transpose()?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.hub_api_url.clone(),
            token,
        })
    }

    /// Fire a named event with the given payload.
    pub async fn fire(
        &self,
        event_name: &str,
        payload: &EventPayload<'_>,
    ) -> Result<(), EventBusError> {
        let url = self.event_url(event_name)?;
        debug!("Firing event {event_name} at {url}");

        let mut request = self.client.post(url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EventBusError::Rejected(status, body.into()));
        }

        Ok(())
    }

    /// Resolve the hub URL for a named event.
    ///
    /// Event names become one path segment, so anything that would change
    /// the route is rejected up front.
    fn event_url(&self, event_name: &str) -> Result<Url, EventBusError> {
        if event_name.is_empty() || event_name.contains(['/', '?', '#']) {
            return Err(EventBusError::EventName(event_name.into()));
        }
        Ok(self.base_url.join(&format!("api/events/{event_name}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bus(base: &str) -> EventBus {
        EventBus {
            client: reqwest::Client::new(),
            base_url: Url::parse(base).unwrap(),
            token: None,
        }
    }

    #[test]
    fn test_event_url() {
        let bus = test_bus("http://hub.local:8123/");
        let url = bus.event_url("assistant_response").unwrap();
        assert_eq!(
            url.as_str(),
            "http://hub.local:8123/api/events/assistant_response"
        );
    }

    #[test]
    fn test_event_url_without_trailing_slash() {
        let bus = test_bus("http://hub.local:8123");
        let url = bus.event_url("assistant_response").unwrap();
        assert_eq!(
            url.as_str(),
            "http://hub.local:8123/api/events/assistant_response"
        );
    }

    #[test]
    fn test_bad_event_names_are_rejected() {
        let bus = test_bus("http://hub.local:8123/");
        assert!(matches!(
            bus.event_url(""),
            Err(EventBusError::EventName(_))
        ));
        assert!(matches!(
            bus.event_url("a/b"),
            Err(EventBusError::EventName(_))
        ));
        assert!(matches!(
            bus.event_url("a?b"),
            Err(EventBusError::EventName(_))
        ));
    }

    #[test]
    fn test_payload_shape() {
        let payload = EventPayload {
            query: "turn on the light",
            response: Some("Okay, turning on the light."),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["query"], "turn on the light");
        assert_eq!(json["response"], "Okay, turning on the light.");

        let no_response = EventPayload {
            query: "hi",
            response: None,
        };
        let json = serde_json::to_value(&no_response).unwrap();
        assert!(json["response"].is_null());
    }
}
