// Building blocks
pub mod config;
pub mod error;
pub mod http;
pub mod media_type;
pub mod poll;
pub mod shell;
pub mod version;

// Provisioning steps
pub mod authorization;
pub mod pipeline;
pub mod plugin;
pub mod postgres;
pub mod provision;
pub mod readiness;
pub mod service;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
