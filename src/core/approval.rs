//! Approval validation for changes to restricted manifests
//!
//! A change is approved for a restricted manifest when every ticket its commit
//! message names is either reachable from the manifest's approval ticket or
//! carries one of the bypass labels.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use crate::core::manifest::ManifestEntry;
use crate::core::tickets::{commit_tickets, DEFAULT_FOOTER_MARKER};
use crate::core::tracker::{TicketTracker, TrackerError};

/// Labels that exempt a ticket from approval-ticket linkage
pub const DEFAULT_BYPASS_LABELS: &[&str] =
    &["doc-change-only", "test-change-only", "analytics-compat-jars"];

/// Knobs for the approval check
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    pub bypass_labels: Vec<String>,

    /// Prefix of commit-message lines that may name tickets, besides the subject
    pub footer_marker: String,

    /// Limit on link hops followed from the approval ticket (`None` = unbounded)
    pub max_depth: Option<usize>,

    /// Treat tracker failures other than "not found" during the bypass check
    /// as errors instead of "no bypass label"
    pub strict_lookups: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            bypass_labels: DEFAULT_BYPASS_LABELS.iter().map(|s| s.to_string()).collect(),
            footer_marker: DEFAULT_FOOTER_MARKER.to_string(),
            max_depth: None,
            strict_lookups: false,
        }
    }
}

/// Why a change is not approved for a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Neither the subject line nor a footer line names a ticket
    NoTicketNamed,

    /// A named ticket is outside the approved set and has no bypass label
    TicketNotApproved {
        ticket: String,
        release: String,
        approval_ticket: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoTicketNamed => write!(f, "the commit message does not name a ticket"),
            Rejection::TicketNotApproved {
                ticket,
                release,
                approval_ticket,
            } => write!(
                f,
                "ticket {} is not approved for {} (see approval ticket {})",
                ticket, release, approval_ticket
            ),
        }
    }
}

/// Outcome of validating one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

/// The approval ticket plus every ticket transitively reachable from it
///
/// Failing to fetch the approval ticket itself is an error. Linked tickets
/// that no longer exist stay in the set but are not expanded further.
pub fn approved_set(
    tracker: &dyn TicketTracker,
    approval_ticket: &str,
    max_depth: Option<usize>,
) -> Result<BTreeSet<String>, TrackerError> {
    let mut approved = BTreeSet::from([approval_ticket.to_string()]);
    let mut queue = VecDeque::from([(approval_ticket.to_string(), 0usize)]);

    while let Some((key, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }

        let ticket = match tracker.ticket(&key) {
            Ok(ticket) => ticket,
            Err(e) if e.is_not_found() && key != approval_ticket => {
                tracing::warn!("Linked ticket {} could not be found, not following it", key);
                continue;
            }
            Err(e) => return Err(e),
        };

        for linked in ticket.linked() {
            if approved.insert(linked.to_string()) {
                queue.push_back((linked.to_string(), depth + 1));
            }
        }
    }

    tracing::debug!(
        "Approval ticket {} covers {} ticket(s)",
        approval_ticket,
        approved.len()
    );
    Ok(approved)
}

/// Whether the ticket carries one of the bypass labels
///
/// A ticket that cannot be fetched (typically a typo in the commit message)
/// counts as having no bypass label.
pub fn can_bypass(
    tracker: &dyn TicketTracker,
    ticket: &str,
    policy: &ApprovalPolicy,
) -> Result<bool, TrackerError> {
    match tracker.ticket(ticket) {
        Ok(t) => Ok(policy.bypass_labels.iter().any(|label| t.has_label(label))),
        Err(e) if policy.strict_lookups && !e.is_not_found() => Err(e),
        Err(e) => {
            tracing::warn!("Could not look up labels of {}: {}", ticket, e);
            Ok(false)
        }
    }
}

/// Check that the commit is approved for the given restricted manifest
pub fn validate_change(
    tracker: &dyn TicketTracker,
    manifest: &ManifestEntry,
    commit_message: &str,
    policy: &ApprovalPolicy,
) -> Result<Verdict, TrackerError> {
    let tickets = commit_tickets(commit_message, &policy.footer_marker);
    if tickets.is_empty() {
        return Ok(Verdict::Rejected(Rejection::NoTicketNamed));
    }

    let Some(approval_ticket) = manifest.approval_ticket.as_deref() else {
        tracing::debug!("Manifest {} has no approval ticket", manifest.name);
        return Ok(Verdict::Approved);
    };

    tracing::info!(
        "Checking ticket(s) {} against approval ticket {} for {}",
        tickets.join(", "),
        approval_ticket,
        manifest.name
    );

    let approved = approved_set(tracker, approval_ticket, policy.max_depth)?;
    for ticket in tickets {
        if approved.contains(&ticket) {
            continue;
        }
        if can_bypass(tracker, &ticket, policy)? {
            tracing::info!("Ticket {} carries a bypass label", ticket);
            continue;
        }
        return Ok(Verdict::Rejected(Rejection::TicketNotApproved {
            ticket,
            release: manifest.display_name().to_string(),
            approval_ticket: approval_ticket.to_string(),
        }));
    }

    Ok(Verdict::Approved)
}
