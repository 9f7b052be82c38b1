//! Grabbit MCP server: lets an agent trace values on a page back to the API
//! calls behind them.

pub mod config;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::ServerConfig;
pub use protocol::ProtocolHandler;
pub use session::GrabSessionManager;
pub use transport::StdioTransport;
