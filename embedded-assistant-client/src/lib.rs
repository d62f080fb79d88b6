//! Client for text conversations with the Google Assistant Service.
//!
//! This crate speaks the embedded assistant protocol (v1alpha2) in its
//! text-in mode: one authenticated bidirectional `Assist` stream per query,
//! with audio output muted. The message bindings in [`proto`] are a
//! hand-maintained subset of the published protocol definition.
//!
//! The protocol and credential format follow the reference client shipped
//! with the Google Assistant SDK samples.

mod credentials;
pub mod proto;
mod session;

pub use credentials::{Authenticator, CredentialError, TokenError, UserCredentials};
pub use session::{
    ASSISTANT_API_ENDPOINT, AssistError, AssistOutcome, SessionConfig, TextAssistant,
};
