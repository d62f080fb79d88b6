//! Conversational session with the embedded assistant service.

use crate::credentials::{Authenticator, TokenError};
use crate::proto::embedded_assistant_client::EmbeddedAssistantClient;
use crate::proto::{
    AssistConfig, AssistRequest, AssistResponse, AudioOutConfig, DeviceConfig, DialogStateIn,
    ScreenOutConfig, assist_config, assist_request, audio_out_config::Encoding,
    screen_out_config::ScreenMode,
};
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

/// Endpoint of the embedded assistant service.
pub const ASSISTANT_API_ENDPOINT: &str = "https://embeddedassistant.googleapis.com";

/// Error type for assist exchanges.
///
/// None of these are retried or recovered locally; the host integration
/// layer is responsible for logging and surfacing them per invocation.
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    /// Refreshing the access token failed.
    #[error("credential refresh failed: {0}")]
    Refresh(#[from] TokenError),
    /// Could not open a channel to the assistant endpoint.
    #[error("failed to connect to assistant endpoint: {0}")]
    Connect(#[from] tonic::transport::Error),
    /// The access token was not usable as an authorization header.
    #[error("access token not usable as authorization header: {0}")]
    Auth(#[from] tonic::metadata::errors::InvalidMetadataValue),
    /// The assist stream failed (including deadline expiry).
    #[error("assist stream failed: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Per-session parameters, fixed at construction.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Language for the conversation (BCP-47, e.g. "en-US").
    pub language_code: String,
    /// Identifier of the device model registered with the assistant API.
    pub device_model_id: String,
    /// Identifier of the registered device instance.
    pub device_id: String,
    /// Request a visual (HTML) rendition of responses.
    pub display: bool,
    /// Deadline for each assist call.
    pub deadline: Duration,
}

/// What an exchange produced.
///
/// Either field may be absent when the response stream carried no text or no
/// screen data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistOutcome {
    pub text: Option<String>,
    pub html: Option<Vec<u8>>,
}

/// A text conversation with the assistant.
///
/// Holds the dialog state the service needs to keep multi-turn context: an
/// opaque continuation token and a flag marking whether the next request
/// starts a fresh conversation. One instance serves the whole process
/// lifetime; callers must not run overlapping exchanges against the same
/// session (both fields below are mutated per exchange).
pub struct TextAssistant {
    config: SessionConfig,
    authenticator: Authenticator,
    conversation_state: Option<Vec<u8>>,
    is_new_conversation: bool,
}

impl TextAssistant {
    pub fn new(config: SessionConfig, authenticator: Authenticator) -> Self {
        Self {
            config,
            authenticator,
            conversation_state: None,
            is_new_conversation: true,
        }
    }

    /// Build the outbound request for the next turn and advance the dialog
    /// state.
    ///
    /// Later turns continue the conversation even if this one's network call
    /// fails, so the new-conversation flag is cleared here rather than after
    /// a successful response.
    fn next_request(&mut self, text_query: &str) -> AssistRequest {
        let config = AssistConfig {
            // Audio output is required by the service but unused here, so
            // request the cheapest encoding with the volume at zero.
            audio_out_config: Some(AudioOutConfig {
                encoding: Encoding::Linear16 as i32,
                sample_rate_hertz: 16000,
                volume_percentage: 0,
            }),
            screen_out_config: self.config.display.then_some(ScreenOutConfig {
                screen_mode: ScreenMode::Playing as i32,
            }),
            dialog_state_in: Some(DialogStateIn {
                conversation_state: self.conversation_state.clone().unwrap_or_default(),
                language_code: self.config.language_code.clone(),
                is_new_conversation: self.is_new_conversation,
            }),
            device_config: Some(DeviceConfig {
                device_id: self.config.device_id.clone(),
                device_model_id: self.config.device_model_id.clone(),
            }),
            r#type: Some(assist_config::Type::TextQuery(text_query.to_owned())),
        };
        self.is_new_conversation = false;

        AssistRequest {
            r#type: Some(assist_request::Type::Config(config)),
        }
    }

    /// Fold one inbound message into the running outcome.
    ///
    /// Only the final observed value of each field survives: later messages
    /// overwrite earlier ones, and empty fields change nothing.
    fn absorb_response(&mut self, response: AssistResponse, outcome: &mut AssistOutcome) {
        if let Some(screen) = response.screen_out
            && !screen.data.is_empty()
        {
            outcome.html = Some(screen.data);
        }
        if let Some(dialog) = response.dialog_state_out {
            if !dialog.conversation_state.is_empty() {
                self.conversation_state = Some(dialog.conversation_state);
            }
            if !dialog.supplemental_display_text.is_empty() {
                outcome.text = Some(dialog.supplemental_display_text);
            }
        }
    }

    /// Send a text query to the assistant and collect the response.
    ///
    /// Performs one authenticated streaming call: a single outbound message,
    /// then inbound messages are drained until the server closes the stream.
    /// The channel is dropped on every exit path.
    pub async fn assist(&mut self, text_query: &str) -> Result<AssistOutcome, AssistError> {
        let request = self.next_request(text_query);
        debug!(
            "Assist request: language={} query={:?}",
            self.config.language_code, text_query
        );

        let access_token = self.authenticator.refresh().await?;
        let channel = connect().await?;
        let mut client = EmbeddedAssistantClient::new(channel);

        let mut rpc = tonic::Request::new(tokio_stream::once(request));
        rpc.set_timeout(self.config.deadline);
        let bearer = MetadataValue::try_from(format!("Bearer {access_token}"))?;
        rpc.metadata_mut().insert("authorization", bearer);

        let mut stream = client.assist(rpc).await?.into_inner();

        let mut outcome = AssistOutcome::default();
        while let Some(response) = stream.message().await? {
            debug!(
                "Assist response: text={:?} screen_bytes={} state_bytes={}",
                response
                    .dialog_state_out
                    .as_ref()
                    .map(|d| d.supplemental_display_text.as_str()),
                response.screen_out.as_ref().map_or(0, |s| s.data.len()),
                response
                    .dialog_state_out
                    .as_ref()
                    .map_or(0, |d| d.conversation_state.len()),
            );
            self.absorb_response(response, &mut outcome);
        }

        Ok(outcome)
    }
}

/// Open a TLS channel to the fixed assistant endpoint.
async fn connect() -> Result<Channel, tonic::transport::Error> {
    debug!("Connecting to {ASSISTANT_API_ENDPOINT}");
    let tls = ClientTlsConfig::new().with_native_roots();
    Endpoint::from_static(ASSISTANT_API_ENDPOINT)
        .tls_config(tls)?
        .connect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::UserCredentials;
    use crate::proto::{DialogStateOut, ScreenOut};

    fn test_session(display: bool) -> TextAssistant {
        let credentials = UserCredentials {
            client_id: "client".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            scopes: vec![],
        };
        TextAssistant::new(
            SessionConfig {
                language_code: "en-US".into(),
                device_model_id: "test_device_model_id".into(),
                device_id: "test_device_id".into(),
                display,
                deadline: Duration::from_secs(10),
            },
            Authenticator::new(credentials),
        )
    }

    fn dialog_config(request: &AssistRequest) -> &AssistConfig {
        match request.r#type.as_ref().unwrap() {
            assist_request::Type::Config(config) => config,
        }
    }

    fn text_response(text: &str, state: &[u8]) -> AssistResponse {
        AssistResponse {
            screen_out: None,
            dialog_state_out: Some(DialogStateOut {
                supplemental_display_text: text.into(),
                conversation_state: state.to_vec(),
            }),
        }
    }

    #[test]
    fn test_first_request_starts_new_conversation() {
        let mut session = test_session(false);

        let request = session.next_request("turn on the light");
        let dialog = dialog_config(&request).dialog_state_in.as_ref().unwrap();

        assert!(dialog.is_new_conversation);
        assert!(dialog.conversation_state.is_empty());
        assert_eq!(dialog.language_code, "en-US");
        // The flag is cleared as soon as the request is built, before any
        // network call can succeed or fail.
        assert!(!session.is_new_conversation);

        let second = session.next_request("and the fan");
        let dialog = dialog_config(&second).dialog_state_in.as_ref().unwrap();
        assert!(!dialog.is_new_conversation);
    }

    #[test]
    fn test_request_carries_query_verbatim() {
        let mut session = test_session(false);

        let request = session.next_request("what's the weather?");
        match dialog_config(&request).r#type.as_ref().unwrap() {
            assist_config::Type::TextQuery(query) => assert_eq!(query, "what's the weather?"),
        }

        let device = dialog_config(&request).device_config.as_ref().unwrap();
        assert_eq!(device.device_id, "test_device_id");
        assert_eq!(device.device_model_id, "test_device_model_id");
    }

    #[test]
    fn test_empty_query_is_not_rejected() {
        let mut session = test_session(false);

        let request = session.next_request("");
        match dialog_config(&request).r#type.as_ref().unwrap() {
            assist_config::Type::TextQuery(query) => assert_eq!(query, ""),
        }
    }

    #[test]
    fn test_audio_out_is_muted_linear16() {
        let mut session = test_session(false);

        let request = session.next_request("hi");
        let audio = dialog_config(&request).audio_out_config.as_ref().unwrap();
        assert_eq!(audio.encoding, Encoding::Linear16 as i32);
        assert_eq!(audio.sample_rate_hertz, 16000);
        assert_eq!(audio.volume_percentage, 0);
    }

    #[test]
    fn test_display_disabled_omits_screen_config() {
        let mut session = test_session(false);
        let request = session.next_request("hi");
        assert!(dialog_config(&request).screen_out_config.is_none());
    }

    #[test]
    fn test_display_enabled_requests_playing_screen() {
        let mut session = test_session(true);
        let request = session.next_request("hi");
        let screen = dialog_config(&request).screen_out_config.as_ref().unwrap();
        assert_eq!(screen.screen_mode, ScreenMode::Playing as i32);
    }

    #[test]
    fn test_last_text_wins_and_token_is_kept() {
        let mut session = test_session(false);
        let mut outcome = AssistOutcome::default();

        session.absorb_response(text_response("A", b"T1"), &mut outcome);
        session.absorb_response(text_response("B", b""), &mut outcome);

        assert_eq!(outcome.text.as_deref(), Some("B"));
        assert_eq!(session.conversation_state.as_deref(), Some(b"T1".as_slice()));
    }

    #[test]
    fn test_stream_without_tokens_leaves_state_unchanged() {
        let mut session = test_session(false);
        session.conversation_state = Some(b"earlier".to_vec());
        let mut outcome = AssistOutcome::default();

        session.absorb_response(text_response("hello", b""), &mut outcome);

        assert_eq!(
            session.conversation_state.as_deref(),
            Some(b"earlier".as_slice())
        );
    }

    #[test]
    fn test_token_is_threaded_into_next_request() {
        let mut session = test_session(false);
        let mut outcome = AssistOutcome::default();
        session.absorb_response(text_response("ok", b"T9"), &mut outcome);

        let request = session.next_request("next turn");
        let dialog = dialog_config(&request).dialog_state_in.as_ref().unwrap();
        assert_eq!(dialog.conversation_state, b"T9");
    }

    #[test]
    fn test_last_screen_data_wins_and_empty_is_ignored() {
        let mut session = test_session(true);
        let mut outcome = AssistOutcome::default();

        let screen = |data: &[u8]| AssistResponse {
            screen_out: Some(ScreenOut {
                format: crate::proto::screen_out::Format::Html as i32,
                data: data.to_vec(),
            }),
            dialog_state_out: None,
        };

        session.absorb_response(screen(b"<p>first</p>"), &mut outcome);
        session.absorb_response(screen(b"<p>second</p>"), &mut outcome);
        session.absorb_response(screen(b""), &mut outcome);

        assert_eq!(outcome.html.as_deref(), Some(b"<p>second</p>".as_slice()));
    }
}
