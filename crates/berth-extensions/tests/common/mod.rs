//! Common test utilities for berth-extensions
//!
//! - Recording mocks of the cluster capability traits
//! - Scratch extension repositories on disk
//! - Manager construction with test configuration

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
