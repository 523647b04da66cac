//! Restricted-branch check flow
//!
//! `scan → reduce → validate(each)`, ending in one of three outcomes. Errors
//! returned from here are internal failures; rejections are outcomes.

use thiserror::Error;

use crate::core::approval::{validate_change, ApprovalPolicy, Rejection, Verdict};
use crate::core::config::ConfigError;
use crate::core::gerrit::{GerritChange, GerritEnvError};
use crate::core::manifest::{ManifestError, ManifestTree};
use crate::core::restriction::{reduce, scan};
use crate::core::tracker::{TicketTracker, TrackerError};
use crate::report::ReportError;

/// A manifest the change was refused for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedManifest {
    pub manifest: String,
    pub release_name: String,
    pub approval_ticket: String,
    pub rejection: Rejection,
}

/// Terminal state of a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The change lands in no restricted manifest
    Unrestricted,

    /// The change is approved for every restricted manifest it lands in
    Approved { manifests: Vec<String> },

    /// The change is not approved for a restricted manifest
    Restricted(RestrictedManifest),
}

/// Failures that abort a check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Environment(#[from] GerritEnvError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Run the check of one change against a loaded manifest tree
pub fn check_change(
    tree: &ManifestTree,
    change: &GerritChange,
    tracker: &dyn TicketTracker,
    policy: &ApprovalPolicy,
) -> Result<Outcome, CheckError> {
    let restricted = scan(tree, &change.project, &change.branch);
    if restricted.is_empty() {
        return Ok(Outcome::Unrestricted);
    }

    let to_validate = reduce(&restricted);
    for manifest in &to_validate {
        match validate_change(tracker, manifest, &change.commit_message, policy)? {
            Verdict::Approved => {
                tracing::info!("Change approved for {}", manifest.name);
            }
            Verdict::Rejected(rejection) => {
                tracing::info!("Change not approved for {}: {}", manifest.name, rejection);
                return Ok(Outcome::Restricted(RestrictedManifest {
                    manifest: manifest.name.clone(),
                    release_name: manifest.display_name().to_string(),
                    approval_ticket: manifest.approval_ticket.clone().unwrap_or_default(),
                    rejection,
                }));
            }
        }
    }

    Ok(Outcome::Approved {
        manifests: restricted.iter().map(|m| m.name.clone()).collect(),
    })
}
