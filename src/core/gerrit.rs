//! The Gerrit change under test, as described by the Gerrit Trigger plugin's
//! environment variables

use base64::Engine;
use serde::Serialize;
use thiserror::Error;

pub const ENV_PROJECT: &str = "GERRIT_PROJECT";
pub const ENV_BRANCH: &str = "GERRIT_BRANCH";
pub const ENV_COMMIT_MESSAGE: &str = "GERRIT_CHANGE_COMMIT_MESSAGE";
pub const ENV_CHANGE_URL: &str = "GERRIT_CHANGE_URL";
pub const ENV_PATCHSET: &str = "GERRIT_PATCHSET_NUMBER";
pub const ENV_EVENT_TYPE: &str = "GERRIT_EVENT_TYPE";

/// Event type of a check requested explicitly through a review comment
pub const COMMENT_ADDED: &str = "comment-added";

/// Errors reading the change description from the environment
#[derive(Debug, Error)]
pub enum GerritEnvError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("GERRIT_CHANGE_COMMIT_MESSAGE is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("GERRIT_CHANGE_COMMIT_MESSAGE is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The change a check runs against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GerritChange {
    pub project: String,
    pub branch: String,
    #[serde(skip)]
    pub commit_message: String,
    pub change_url: String,
    pub patchset: String,
    pub event_type: String,
}

impl GerritChange {
    /// Read the change from the process environment
    pub fn from_env() -> Result<Self, GerritEnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the change through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GerritEnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).ok_or(GerritEnvError::Missing(name));

        let encoded = get(ENV_COMMIT_MESSAGE)?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;

        Ok(Self {
            project: get(ENV_PROJECT)?,
            branch: get(ENV_BRANCH)?,
            commit_message: String::from_utf8(decoded)?,
            change_url: get(ENV_CHANGE_URL)?,
            patchset: get(ENV_PATCHSET)?,
            event_type: get(ENV_EVENT_TYPE)?,
        })
    }

    /// Whether the check was requested through a review comment
    pub fn is_comment_trigger(&self) -> bool {
        self.event_type == COMMENT_ADDED
    }
}
