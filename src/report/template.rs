//! Report templates
//!
//! Templates are embedded from `templates/` and rendered with Tera from typed
//! contexts. Names ending in `.html` are HTML-escaped by Tera.

use chrono::Utc;
use rust_embed::Embed;
use serde::Serialize;
use tera::Tera;

use crate::core::check::RestrictedManifest;
use crate::core::gerrit::GerritChange;
use crate::report::{quote_url, ReportError};

pub const MAILTO_TEMPLATE: &str = "mailto_url.txt";
pub const RESTRICTED_TEMPLATE: &str = "restricted.html";
pub const FAILURE_TEMPLATE: &str = "rest_failed.html";

/// Characters left unescaped in the mailto link
const MAILTO_SAFE: &str = ":@=&?";

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

/// Everything the restricted report and the approval request link show
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub manifest: String,
    pub release_name: String,
    pub approval_ticket: String,
    pub reason: String,
    pub bypass_labels: Vec<String>,

    pub project: String,
    pub branch: String,
    pub change_url: String,
    pub patchset: String,
    pub event_type: String,

    /// Recipient of approval requests
    pub request_address: String,

    /// Encoded approval request link, filled in by [`ReportRenderer::render_restricted`]
    pub mailto_url: String,

    pub generated: String,
}

impl ReportContext {
    pub fn new(restricted: &RestrictedManifest, change: &GerritChange) -> Self {
        Self {
            manifest: restricted.manifest.clone(),
            release_name: restricted.release_name.clone(),
            approval_ticket: restricted.approval_ticket.clone(),
            reason: restricted.rejection.to_string(),
            bypass_labels: Vec::new(),
            project: change.project.clone(),
            branch: change.branch.clone(),
            change_url: change.change_url.clone(),
            patchset: change.patchset.clone(),
            event_type: change.event_type.clone(),
            request_address: String::new(),
            mailto_url: String::new(),
            generated: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_request_address(mut self, address: impl Into<String>) -> Self {
        self.request_address = address.into();
        self
    }

    pub fn with_bypass_labels(mut self, labels: Vec<String>) -> Self {
        self.bypass_labels = labels;
        self
    }
}

/// Context of the report written when the check itself fails
#[derive(Debug, Clone, Serialize)]
pub struct FailureContext {
    pub message: String,
    pub generated: String,
}

impl FailureContext {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            generated: Utc::now().to_rfc3339(),
        }
    }
}

/// Rendered restricted report
#[derive(Debug, Clone)]
pub struct RestrictedReport {
    /// Approval request link before encoding, for the console
    pub mailto_raw: String,
    pub html: String,
}

/// Renders reports from the embedded templates
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    /// Create a renderer with the embedded templates
    pub fn new() -> Result<Self, ReportError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                let template_str = std::str::from_utf8(&content.data)
                    .map_err(|e| ReportError::RenderError(format!("{}: {}", filename, e)))?;
                tera.add_raw_template(filename, template_str)
                    .map_err(|e| ReportError::RenderError(e.to_string()))?;
            }
        }

        Ok(Self { tera })
    }

    fn render<T: Serialize>(&self, name: &str, ctx: &T) -> Result<String, ReportError> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(ReportError::NotFound(name.to_string()));
        }
        let context =
            tera::Context::from_serialize(ctx).map_err(|e| ReportError::RenderError(e.to_string()))?;
        self.tera
            .render(name, &context)
            .map_err(|e| ReportError::RenderError(e.to_string()))
    }

    /// Render the approval request link (unencoded)
    pub fn render_mailto(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        Ok(self.render(MAILTO_TEMPLATE, ctx)?.trim().to_string())
    }

    /// Render the request link, then the HTML report embedding its encoded form
    pub fn render_restricted(&self, mut ctx: ReportContext) -> Result<RestrictedReport, ReportError> {
        let mailto_raw = self.render_mailto(&ctx)?;
        ctx.mailto_url = quote_url(&mailto_raw, MAILTO_SAFE);
        let html = self.render(RESTRICTED_TEMPLATE, &ctx)?;
        Ok(RestrictedReport { mailto_raw, html })
    }

    /// Render the HTML page describing an internal failure
    pub fn render_failure(&self, ctx: &FailureContext) -> Result<String, ReportError> {
        self.render(FAILURE_TEMPLATE, ctx)
    }
}
