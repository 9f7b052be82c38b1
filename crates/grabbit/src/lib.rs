//! Grabbit: capture a page's network exchanges, trace a visible value back to
//! the API field that produced it, and emit replay artifacts.

pub mod artifact;
pub mod buffer;
pub mod config;
pub mod interceptor;
pub mod log;
pub mod matcher;
pub mod path;
pub mod pipeline;
pub mod replay;
pub mod schema;
pub mod session;
pub mod types;

pub use artifact::ArtifactBundle;
pub use buffer::ExchangeBuffer;
pub use config::CaptureConfig;
pub use interceptor::{HttpClient, Interceptor, RawCapture};
pub use log::{MatchLog, Outcome};
pub use matcher::{find_image, find_text, Found, MatchLocation, MatchResult, PageSnapshot};
pub use path::StructuralPath;
pub use replay::{build_replay_command, ReplayPolicy};
pub use schema::build_openapi;
pub use session::PageSession;
pub use types::*;
