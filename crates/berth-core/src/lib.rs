//! # berth-core
//!
//! Core library for Berth providing:
//! - The extension descriptor model (`description.yaml`)
//! - The registry wire model exchanged with the extension registry
//! - Manager configuration with hierarchical loading
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod utils;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use types::ManagerConfig;
pub use utils::get_home_dir;
