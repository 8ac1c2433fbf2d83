pub mod config;
pub mod error;
pub mod payload;
pub mod receiver;
pub mod sender;

pub use config::{Config, FailurePolicy, ReceiverConfig};
pub use error::{ConfigError, SendError};
pub use payload::Payload;
pub use sender::{Attempt, Outcome, Sender, Summary};
