//! Ticket tracker access
//!
//! The restricted-branch check only needs three things from a tracker: a
//! ticket's labels, the tickets it links to, and its subtasks. [`TicketTracker`]
//! captures that; [`JiraClient`] talks to a Jira server over its REST API and
//! [`SnapshotTracker`] serves tickets from a YAML snapshot for offline runs.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::yaml::{parse_yaml_file, YamlError};

/// Fields requested from Jira for each ticket
const JIRA_FIELDS: &str = "labels,issuelinks,subtasks";

/// A ticket with the link information the approval check walks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    #[serde(skip)]
    pub key: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Outward links ("depends on")
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,

    /// Inward links ("relates to")
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relates: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<String>,
}

impl Ticket {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// All tickets reachable in one step: depends, relates and subtasks
    pub fn linked(&self) -> impl Iterator<Item = &str> {
        self.depends
            .iter()
            .chain(&self.relates)
            .chain(&self.subtasks)
            .map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Errors from ticket lookups
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Ticket {0} does not exist")]
    NotFound(String),

    #[error("Unauthorized: check tracker credentials")]
    Unauthorized,

    #[error("Tracker returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Tracker request failed: {0}")]
    Transport(String),

    #[error("Failed to parse tracker response: {0}")]
    Parse(String),

    #[error("Failed to load ticket snapshot: {0}")]
    Snapshot(Box<YamlError>),

    #[error("No ticket tracker configured: set JIRA_URL, jira.url in the config file, or --tickets-file")]
    Unconfigured,
}

impl TrackerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NotFound(_))
    }
}

/// Read access to a ticket tracker
pub trait TicketTracker {
    fn ticket(&self, key: &str) -> Result<Ticket, TrackerError>;
}

impl<T: TicketTracker + ?Sized> TicketTracker for &T {
    fn ticket(&self, key: &str) -> Result<Ticket, TrackerError> {
        (**self).ticket(key)
    }
}

impl<T: TicketTracker + ?Sized> TicketTracker for Box<T> {
    fn ticket(&self, key: &str) -> Result<Ticket, TrackerError> {
        (**self).ticket(key)
    }
}

// ============================================================================
// Jira
// ============================================================================

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    #[serde(default)]
    fields: JiraFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JiraFields {
    labels: Vec<String>,
    issuelinks: Vec<JiraLink>,
    subtasks: Vec<JiraRef>,
}

#[derive(Debug, Deserialize)]
struct JiraLink {
    #[serde(rename = "outwardIssue")]
    outward_issue: Option<JiraRef>,
    #[serde(rename = "inwardIssue")]
    inward_issue: Option<JiraRef>,
}

#[derive(Debug, Deserialize)]
struct JiraRef {
    key: String,
}

impl From<JiraIssue> for Ticket {
    fn from(issue: JiraIssue) -> Self {
        let JiraFields {
            labels,
            issuelinks,
            subtasks,
        } = issue.fields;

        let mut depends = Vec::new();
        let mut relates = Vec::new();
        for link in issuelinks {
            if let Some(out) = link.outward_issue {
                depends.push(out.key);
            }
            if let Some(inward) = link.inward_issue {
                relates.push(inward.key);
            }
        }

        Ticket {
            key: issue.key,
            labels,
            depends,
            relates,
            subtasks: subtasks.into_iter().map(|s| s.key).collect(),
        }
    }
}

/// Blocking client for the Jira REST API
#[derive(Clone)]
pub struct JiraClient {
    base_url: String,
    auth: Option<String>,
    agent: ureq::Agent,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl JiraClient {
    /// Create a client; credentials are sent as basic auth when both are given
    pub fn new(base_url: impl Into<String>, user: Option<&str>, token: Option<&str>) -> Self {
        let auth = match (user, token) {
            (Some(user), Some(token)) => Some(format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, token))
            )),
            (None, Some(token)) => Some(format!("Bearer {}", token)),
            _ => None,
        };

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            agent: ureq::Agent::new(),
        }
    }

    fn issue_url(&self, key: &str) -> String {
        format!(
            "{}/rest/api/2/issue/{}",
            self.base_url,
            urlencoding::encode(key)
        )
    }
}

impl TicketTracker for JiraClient {
    fn ticket(&self, key: &str) -> Result<Ticket, TrackerError> {
        tracing::debug!("Fetching ticket {} from {}", key, self.base_url);

        let mut request = self
            .agent
            .get(&self.issue_url(key))
            .query("fields", JIRA_FIELDS);
        if let Some(ref auth) = self.auth {
            request = request.set("Authorization", auth);
        }

        match request.call() {
            Ok(response) => {
                let issue: JiraIssue = response
                    .into_json()
                    .map_err(|e| TrackerError::Parse(e.to_string()))?;
                Ok(issue.into())
            }
            Err(ureq::Error::Status(404, _)) => Err(TrackerError::NotFound(key.to_string())),
            Err(ureq::Error::Status(401 | 403, _)) => Err(TrackerError::Unauthorized),
            Err(ureq::Error::Status(status, response)) => Err(TrackerError::Http {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(t)) => Err(TrackerError::Transport(t.to_string())),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    tickets: BTreeMap<String, Option<Ticket>>,
}

/// Tickets served from memory, typically loaded from a YAML snapshot:
///
/// ```yaml
/// tickets:
///   CBD-5000:
///     depends: [MB-1]
///     subtasks: [CBD-5001]
///   MB-2:
///     labels: [doc-change-only]
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
    tickets: BTreeMap<String, Ticket>,
}

impl SnapshotTracker {
    pub fn new(tickets: impl IntoIterator<Item = Ticket>) -> Self {
        Self {
            tickets: tickets.into_iter().map(|t| (t.key.clone(), t)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let snapshot: Snapshot =
            parse_yaml_file(path).map_err(|e| TrackerError::Snapshot(Box::new(e)))?;
        Ok(Self::new(snapshot.tickets.into_iter().map(|(key, t)| Ticket {
            key,
            ..t.unwrap_or_default()
        })))
    }
}

impl TicketTracker for SnapshotTracker {
    fn ticket(&self, key: &str) -> Result<Ticket, TrackerError> {
        self.tickets
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))
    }
}

/// Stand-in used when no tracker is configured; every lookup fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTracker;

impl TicketTracker for UnconfiguredTracker {
    fn ticket(&self, _key: &str) -> Result<Ticket, TrackerError> {
        Err(TrackerError::Unconfigured)
    }
}
