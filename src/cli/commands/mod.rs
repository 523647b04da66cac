//! CLI command implementations

pub mod completions;
pub mod drift;
pub mod restricted;
