//! # PromoPilot Core
//!
//! Shared configuration and error types for the PromoPilot automation core.

pub mod config;
pub mod error;

pub use config::PromoPilotConfig;
pub use error::{PromoPilotError, Result};
