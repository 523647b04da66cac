//! Core module - check logic independent of the command line

pub mod approval;
pub mod check;
pub mod config;
pub mod drift;
pub mod gerrit;
pub mod manifest;
pub mod restriction;
pub mod tickets;
pub mod tracker;

pub use approval::{ApprovalPolicy, Rejection, Verdict};
pub use check::{check_change, CheckError, Outcome, RestrictedManifest};
pub use config::{Config, ConfigError};
pub use gerrit::{GerritChange, GerritEnvError};
pub use manifest::{ManifestEntry, ManifestError, ManifestSource, ManifestTree};
pub use tracker::{JiraClient, SnapshotTracker, Ticket, TicketTracker, TrackerError};
