//! relcheck: release-engineering checks
//!
//! Two checks run from CI jobs of the build/release pipeline:
//!
//! - the restricted-branch check decides whether a Gerrit change to a branch
//!   of a restricted release is covered by that release's approval ticket
//! - the drift check verifies a third-party compliance manifest against the
//!   package versions recorded in built dependency archives

pub mod cli;
pub mod core;
pub mod report;
pub mod yaml;
