//! Check reports: console banners, the HTML report file and the approval
//! request link

pub mod template;

use std::path::Path;
use thiserror::Error;

pub use template::{FailureContext, ReportContext, ReportRenderer};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal states printed as banners; CI jobs match on these labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Restricted,
    Approved,
    Unrestricted { silent: bool },
    Failure,
}

impl Banner {
    fn label(&self) -> &'static str {
        match self {
            Banner::Restricted => "RESTRICTED",
            Banner::Approved => "APPROVED",
            Banner::Unrestricted { silent: true } => "UNRESTRICTED (SILENT)",
            Banner::Unrestricted { silent: false } => "UNRESTRICTED",
            Banner::Failure => "FAILURE",
        }
    }

    /// Banner text, padded with blank lines so it stands out in build logs
    pub fn render(&self, message: &str) -> String {
        let rule = "*".repeat(if *self == Banner::Failure { 7 } else { 9 });
        format!(
            "\n\n\n{rule}\n{}: {}\n{rule}\n\n\n",
            self.label(),
            message,
            rule = rule
        )
    }
}

/// Remove a report left over from a previous run
pub fn clear_report(path: &Path) -> Result<(), ReportError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Write the report body, replacing any existing file
pub fn write_report(path: &Path, html: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    tracing::debug!("Wrote report to {}", path.display());
    Ok(())
}

/// Percent-encode a URL, leaving unreserved characters and `safe` untouched
pub fn quote_url(url: &str, safe: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        if safe.contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}
