pub mod events;
pub mod init_logging;
pub mod relay;

pub(crate) mod assistant;

pub use relay::{Relay, RelayConfig, RelayError};
