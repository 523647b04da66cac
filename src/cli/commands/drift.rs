//! `relcheck drift` command - Verify a compliance manifest against built packages
//!
//! Reads the environment listings out of the final dependency package archives
//! and checks that the compliance manifest records exactly those components at
//! those versions.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::core::drift::{
    detect_drift, load_environments, read_dependencies_file, read_name_list, ComplianceManifest,
    DriftReport, DEFAULT_PLATFORMS,
};

/// Exit status when the compliance manifest needs updating
pub const EXIT_DRIFT: u8 = 1;

#[derive(clap::Args, Debug)]
pub struct DriftArgs {
    /// Full version of the dependency package, e.g. 7.5.0-cb1
    #[arg(long = "version", value_name = "VERSION")]
    pub package_version: String,

    /// Directory containing the final package .tgz files
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Package build-tools directory holding the compliance files
    #[arg(short, long, default_value = "..")]
    pub src_dir: PathBuf,

    /// Package name used in archive file names
    #[arg(long, default_value = "cbpy")]
    pub package: String,

    /// Platforms to read (repeatable; default: all supported platforms)
    #[arg(long = "platform")]
    pub platforms: Vec<String>,

    /// Compliance manifest (default: <src-dir>/blackduck/black-duck-manifest.yaml.in)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Ignore list (default: <src-dir>/blackduck-ignore.txt)
    #[arg(long)]
    pub ignore_file: Option<PathBuf>,

    /// Stub packages (default: <src-dir>/cb-stubs.txt)
    #[arg(long)]
    pub stubs_file: Option<PathBuf>,
}

impl DriftArgs {
    fn platforms(&self) -> Vec<String> {
        if self.platforms.is_empty() {
            DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect()
        } else {
            self.platforms.clone()
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.manifest.clone().unwrap_or_else(|| {
            self.src_dir
                .join("blackduck")
                .join("black-duck-manifest.yaml.in")
        })
    }

    fn ignore_path(&self) -> PathBuf {
        self.ignore_file
            .clone()
            .unwrap_or_else(|| self.src_dir.join("blackduck-ignore.txt"))
    }

    fn stubs_path(&self) -> PathBuf {
        self.stubs_file
            .clone()
            .unwrap_or_else(|| self.src_dir.join("cb-stubs.txt"))
    }
}

pub fn run(args: DriftArgs) -> Result<ExitCode> {
    let manifest = ComplianceManifest::load(&args.manifest_path()).into_diagnostic()?;
    let ignored = read_name_list(&args.ignore_path()).into_diagnostic()?;
    let stubs: BTreeSet<String> = read_dependencies_file(&args.stubs_path())
        .into_diagnostic()?
        .into_keys()
        .collect();

    let environments = load_environments(
        &args.directory,
        &args.package,
        &args.package_version,
        &args.platforms(),
    )
    .into_diagnostic()?;

    let report = detect_drift(&environments, &manifest, &ignored, &stubs);
    print_report(&report);

    if report.has_errors() {
        return Ok(ExitCode::from(EXIT_DRIFT));
    }

    println!(
        "\n\n{} Compliance manifest is all correct!\n",
        style("✓").green()
    );
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &DriftReport) {
    if report.has_errors() {
        println!(
            "{}",
            style("ERROR: the compliance manifest is incorrect!").red().bold()
        );
    }

    if !report.missing.is_empty() {
        println!("\nDeps in current environments but missing from the manifest:");
        for (dep, version) in &report.missing {
            println!("   {} ({})", style(dep).yellow(), version);
        }
    }

    if !report.drifted.is_empty() {
        println!("\nDeps with incorrect versions in the manifest:");
        for (dep, drifted) in &report.drifted {
            println!(
                "   {} built {}, manifest has [{}]",
                style(dep).yellow(),
                drifted.version,
                drifted.manifest_versions.join(", ")
            );
        }
    }

    if !report.removed.is_empty() {
        println!("\nDeps in the manifest but no longer in environments:");
        for dep in &report.removed {
            println!("   {}", style(dep).yellow());
        }
    }

    if !report.unnecessary_ignored.is_empty() {
        println!("\nDeps in the ignore list that are no longer part of the package:");
        for dep in &report.unnecessary_ignored {
            println!("   {}", style(dep).dim());
        }
    }
}
