//! Message and service bindings for `google.assistant.embedded.v1alpha2`.
//!
//! Hand-maintained subset of the published protocol, limited to the fields a
//! text conversation sends and reads. Field tags match the wire format, so
//! messages decoded here interoperate with the real service; fields this
//! crate never touches (audio in/out data, speech results, device actions)
//! are skipped by prost on decode.

/// The top-level message sent on the `Assist` stream.
///
/// A text conversation sends exactly one of these, carrying the config.
/// The `audio_in` variant of the upstream oneof is intentionally absent.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AssistRequest {
    #[prost(oneof = "assist_request::Type", tags = "1")]
    pub r#type: Option<assist_request::Type>,
}

pub mod assist_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Config(super::AssistConfig),
    }
}

/// Parameters for a single `Assist` call.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AssistConfig {
    #[prost(message, optional, tag = "2")]
    pub audio_out_config: Option<AudioOutConfig>,
    #[prost(message, optional, tag = "8")]
    pub screen_out_config: Option<ScreenOutConfig>,
    #[prost(message, optional, tag = "3")]
    pub dialog_state_in: Option<DialogStateIn>,
    #[prost(message, optional, tag = "4")]
    pub device_config: Option<DeviceConfig>,
    #[prost(oneof = "assist_config::Type", tags = "31")]
    pub r#type: Option<assist_config::Type>,
}

pub mod assist_config {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        /// Text input for the assistant, in place of audio.
        #[prost(string, tag = "31")]
        TextQuery(String),
    }
}

/// How the server should encode the audio it returns.
///
/// The service requires this even when the caller discards the audio; a text
/// conversation requests LINEAR16 at 16 kHz with the volume at zero.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioOutConfig {
    #[prost(enumeration = "audio_out_config::Encoding", tag = "1")]
    pub encoding: i32,
    #[prost(int32, tag = "2")]
    pub sample_rate_hertz: i32,
    #[prost(int32, tag = "3")]
    pub volume_percentage: i32,
}

pub mod audio_out_config {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Encoding {
        Unspecified = 0,
        Linear16 = 1,
        Mp3 = 2,
        OpusInOgg = 3,
    }
}

/// Requests a visual (HTML) rendition of the response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ScreenOutConfig {
    #[prost(enumeration = "screen_out_config::ScreenMode", tag = "1")]
    pub screen_mode: i32,
}

pub mod screen_out_config {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum ScreenMode {
        Unspecified = 0,
        Off = 1,
        Playing = 3,
    }
}

/// Client-side dialog state carried into a request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DialogStateIn {
    /// Opaque token from a prior `DialogStateOut`; empty on the first turn.
    #[prost(bytes = "vec", tag = "1")]
    pub conversation_state: Vec<u8>,
    #[prost(string, tag = "2")]
    pub language_code: String,
    #[prost(bool, tag = "7")]
    pub is_new_conversation: bool,
}

/// Identifies the registered device making the request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceConfig {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(string, tag = "3")]
    pub device_model_id: String,
}

/// One message of the server's response stream.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AssistResponse {
    #[prost(message, optional, tag = "4")]
    pub screen_out: Option<ScreenOut>,
    #[prost(message, optional, tag = "5")]
    pub dialog_state_out: Option<DialogStateOut>,
}

/// Visual response payload.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ScreenOut {
    #[prost(enumeration = "screen_out::Format", tag = "1")]
    pub format: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

pub mod screen_out {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Format {
        Unspecified = 0,
        Html = 1,
    }
}

/// Server-side dialog state carried out of a response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DialogStateOut {
    #[prost(string, tag = "1")]
    pub supplemental_display_text: String,
    /// Opaque token to send with the next turn; empty when the server issued
    /// none in this message.
    #[prost(bytes = "vec", tag = "2")]
    pub conversation_state: Vec<u8>,
}

pub mod embedded_assistant_client {
    //! Minimal client for the `EmbeddedAssistant` service.
    //!
    //! Only the `Assist` bidirectional-streaming method exists upstream, so
    //! only it is bound here.

    use super::{AssistRequest, AssistResponse};
    use http::uri::PathAndQuery;
    use tokio_stream::Stream;
    use tonic::codec::Streaming;
    use tonic::transport::Channel;

    #[derive(Debug, Clone)]
    pub struct EmbeddedAssistantClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl EmbeddedAssistantClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        /// Initiate the bidirectional `Assist` stream.
        ///
        /// The caller supplies the outbound request sequence (a single
        /// element for text conversations) and reads responses from the
        /// returned stream until the server closes it.
        pub async fn assist<S>(
            &mut self,
            request: tonic::Request<S>,
        ) -> Result<tonic::Response<Streaming<AssistResponse>>, tonic::Status>
        where
            S: Stream<Item = AssistRequest> + Send + 'static,
        {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::default();
            let path = PathAndQuery::from_static(
                "/google.assistant.embedded.v1alpha2.EmbeddedAssistant/Assist",
            );
            self.inner.streaming(request, path, codec).await
        }
    }
}
