//! Server-side state: the current page, settings and debug log.

pub mod manager;

pub use manager::{FindKind, FindOutcome, GrabSessionManager};
