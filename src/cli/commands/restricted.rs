//! `relcheck restricted` command - Restricted-branch approval check
//!
//! Intended to run as a Gerrit trigger job. The change is described by the
//! Gerrit Trigger plugin's environment variables:
//!
//!   GERRIT_PROJECT   GERRIT_BRANCH   GERRIT_CHANGE_COMMIT_MESSAGE
//!   GERRIT_CHANGE_URL   GERRIT_PATCHSET_NUMBER   GERRIT_EVENT_TYPE
//!
//! Exit status: 0 approved or unrestricted, 5 restricted, 6 the check failed.

use miette::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::GlobalOpts;
use crate::core::check::{check_change, CheckError, Outcome};
use crate::core::config::{Config, DEFAULT_REPORT_PATH};
use crate::core::gerrit::GerritChange;
use crate::core::manifest::{is_remote, GitManifests, LocalManifests, ManifestSource};
use crate::core::tracker::{JiraClient, SnapshotTracker, TicketTracker, UnconfiguredTracker};
use crate::report::template::ReportContext;
use crate::report::{clear_report, write_report, Banner, FailureContext, ReportRenderer};

/// Exit status when the change is not approved for a restricted manifest
pub const EXIT_RESTRICTED: u8 = 5;

/// Exit status when the check itself could not complete
pub const EXIT_INTERNAL_FAILURE: u8 = 6;

#[derive(clap::Args, Debug)]
pub struct RestrictedArgs {
    /// Alternate manifest source: a git URL, or a local directory / product-config.yaml
    #[arg(short = 'p', long, env = "RELCHECK_MANIFEST_PROJECT")]
    pub manifest_project: Option<String>,

    /// Where a remote manifest repository is checked out
    #[arg(long)]
    pub checkout_dir: Option<PathBuf>,

    /// HTML report file (rewritten on every run)
    #[arg(long, env = "RELCHECK_REPORT")]
    pub report: Option<PathBuf>,

    /// Jira base URL
    #[arg(long, env = "JIRA_URL")]
    pub jira_url: Option<String>,

    /// Jira user for basic authentication
    #[arg(long, env = "JIRA_USER")]
    pub jira_user: Option<String>,

    /// Jira API token
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// Read tickets from a YAML snapshot instead of Jira
    #[arg(long)]
    pub tickets_file: Option<PathBuf>,

    /// Fail the check when a bypass-label lookup fails for any reason other
    /// than the ticket not existing
    #[arg(long)]
    pub strict_lookups: bool,
}

pub fn run(args: RestrictedArgs, global: &GlobalOpts) -> Result<ExitCode> {
    let config = Config::load(global.config.as_deref());
    let report_path = args
        .report
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.report.path.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));

    let renderer = match ReportRenderer::new() {
        Ok(renderer) => renderer,
        Err(err) => return Ok(report_failure(None, &report_path, &CheckError::from(err))),
    };

    let result = config
        .map_err(CheckError::from)
        .and_then(|config| execute(&args, &config, &report_path, &renderer));

    Ok(result.unwrap_or_else(|err| report_failure(Some(&renderer), &report_path, &err)))
}

fn execute(
    args: &RestrictedArgs,
    config: &Config,
    report_path: &Path,
    renderer: &ReportRenderer,
) -> Result<ExitCode, CheckError> {
    clear_report(report_path)?;

    let change = GerritChange::from_env()?;
    tracing::info!(
        "Checking {} change to {} ({})",
        change.project,
        change.branch,
        change.change_url
    );

    let source = manifest_source(args, config);
    tracing::info!("Loading manifests from {}", source.describe());
    let tree = source.load()?;

    let tracker = ticket_tracker(args, config)?;
    let mut policy = config.approval.policy();
    policy.strict_lookups |= args.strict_lookups;

    match check_change(&tree, &change, tracker.as_ref(), &policy)? {
        Outcome::Restricted(restricted) => {
            let ctx = ReportContext::new(&restricted, &change)
                .with_request_address(config.report.request_address.clone())
                .with_bypass_labels(policy.bypass_labels.clone());
            let report = renderer.render_restricted(ctx)?;

            println!("{}", report.mailto_raw);
            write_report(report_path, &report.html)?;
            print!("{}", Banner::Restricted.render(&restricted.rejection.to_string()));
            Ok(ExitCode::from(EXIT_RESTRICTED))
        }
        Outcome::Approved { manifests } => {
            tracing::debug!("Approved for {}", manifests.join(", "));
            print!(
                "{}",
                Banner::Approved.render("Commit is approved for all restricted manifests")
            );
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Unrestricted => {
            // Jenkins skips voting on SILENT results unless the check was
            // requested through a review comment
            let silent = !change.is_comment_trigger();
            print!(
                "{}",
                Banner::Unrestricted { silent }.render("Branch is in no restricted manifests")
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn manifest_source(args: &RestrictedArgs, config: &Config) -> Box<dyn ManifestSource> {
    let project = args
        .manifest_project
        .clone()
        .unwrap_or_else(|| config.manifest_project.clone());

    if is_remote(&project) {
        let checkout = args
            .checkout_dir
            .clone()
            .unwrap_or_else(|| config.checkout_dir.clone());
        Box::new(GitManifests::new(project, checkout))
    } else {
        Box::new(LocalManifests::new(project))
    }
}

fn ticket_tracker(
    args: &RestrictedArgs,
    config: &Config,
) -> Result<Box<dyn TicketTracker>, CheckError> {
    if let Some(ref path) = args.tickets_file {
        tracing::info!("Using ticket snapshot {}", path.display());
        return Ok(Box::new(SnapshotTracker::load(path)?));
    }

    let url = args.jira_url.as_ref().or(config.jira.url.as_ref());
    match url {
        Some(url) => {
            let user = args.jira_user.as_deref().or(config.jira.user.as_deref());
            Ok(Box::new(JiraClient::new(
                url.as_str(),
                user,
                args.jira_token.as_deref(),
            )))
        }
        None => Ok(Box::new(UnconfiguredTracker)),
    }
}

fn report_failure(renderer: Option<&ReportRenderer>, path: &Path, err: &CheckError) -> ExitCode {
    tracing::error!("Restricted branch check failed: {}", err);

    if let Some(renderer) = renderer {
        let written = renderer
            .render_failure(&FailureContext::new(err.to_string()))
            .and_then(|html| write_report(path, &html));
        if let Err(e) = written {
            tracing::error!("Could not write failure report {}: {}", path.display(), e);
        }
    }

    print!("{}", Banner::Failure.render(&err.to_string()));
    ExitCode::from(EXIT_INTERNAL_FAILURE)
}
