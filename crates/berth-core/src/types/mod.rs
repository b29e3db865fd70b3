//! Type definitions for Berth descriptors, registry payloads and configuration

mod extension_types;
mod registry_types;
mod runtime_config;
mod step_types;

pub use extension_types::*;
pub use registry_types::*;
pub use runtime_config::*;
pub use step_types::*;
