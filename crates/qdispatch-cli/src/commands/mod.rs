//! CLI command implementations.

pub mod backends;
pub mod common;
pub mod groups;
pub mod monitor;
pub mod refresh;
pub mod select;
pub mod version;
