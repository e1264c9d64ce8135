//! MediAssist client library: chat session, backend HTTP calls, config, and
//! text rendering. Used by the `mediassist` binary.

pub mod api;
pub mod config;
pub mod conversation;
pub mod messages;
pub mod render;
pub mod session;

pub use api::{ApiClient, ClientError};
pub use config::{default_config_path, Config, ConfigError, QueryOptions, Settings};
pub use conversation::{Citation, Confidence, Conversation, Role, Turn, FALLBACK_REPLY};
pub use session::{ChatSession, ClearOutcome, Rejection, RequestState, SubmitOutcome};
