//! Tool implementations.

pub mod artifact_build;
pub mod buffer_list;
pub mod capture_record;
pub mod debug_log;
pub mod exchange_find;
pub mod page_load;
pub mod registry;
pub mod settings_update;

pub use registry::ToolRegistry;
