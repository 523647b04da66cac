//! Restriction manifest tree
//!
//! A manifest tree maps manifest names (e.g. `couchbase-server/trinity/7.6.0.xml`)
//! to the release metadata used by the restricted-branch check: whether the
//! release is restricted, which ticket approves changes to it, its parent
//! release and the branch each project follows.
//!
//! Trees are loaded from `product-config.yaml` files, either from a local
//! directory/file or from a git checkout of the manifest repository.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

use crate::yaml::{parse_yaml_file, YamlError};

/// Branch a project follows when neither the project nor the manifest names one
pub const FALLBACK_BRANCH: &str = "master";

/// File name holding the manifest metadata of one product
pub const PRODUCT_CONFIG_FILE: &str = "product-config.yaml";

/// A single manifest (release) definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestEntry {
    /// Manifest name, filled in from the key of the `manifests` map
    #[serde(skip)]
    pub name: String,

    /// Human-readable release name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    /// Whether changes to this release require approval
    pub restricted: bool,

    /// Ticket whose links define the approved change set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_ticket: Option<String>,

    /// Name of the parent manifest (the release this one branched from)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Branch used by projects without an explicit revision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    /// Projects exempt from the restriction
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrestricted_projects: Vec<String>,

    /// Projects in the manifest, with an optional branch override
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: BTreeMap<String, Option<String>>,
}

impl ManifestEntry {
    /// Release name for display, falling back to the manifest name
    pub fn display_name(&self) -> &str {
        self.release_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the project is exempt from this manifest's restriction
    pub fn is_unrestricted(&self, project: &str) -> bool {
        self.unrestricted_projects.iter().any(|p| p == project)
    }

    /// Branch the project follows in this manifest, or `None` if the project
    /// is not part of the manifest
    pub fn branch_for(&self, project: &str) -> Option<&str> {
        let revision = self.projects.get(project)?;
        Some(
            revision
                .as_deref()
                .or(self.default_branch.as_deref())
                .unwrap_or(FALLBACK_BRANCH),
        )
    }
}

/// Contents of one `product-config.yaml`
#[derive(Debug, Default, Deserialize)]
struct ProductConfig {
    #[serde(default)]
    manifests: BTreeMap<String, ManifestEntry>,
}

/// All manifests known to the manifest repository, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ManifestTree {
    entries: BTreeMap<String, ManifestEntry>,
}

impl ManifestTree {
    /// Build a tree from entries, keying each by its name
    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.name.clone(), e)).collect(),
        }
    }

    /// Look up a manifest by name
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    /// Iterate all manifests in name order
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge the manifests of one product config file into the tree
    fn merge_file(&mut self, path: &Path) -> Result<(), ManifestError> {
        let config: ProductConfig = parse_yaml_file(path).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

        for (name, mut entry) in config.manifests {
            if self.entries.contains_key(&name) {
                return Err(ManifestError::Duplicate {
                    name,
                    path: path.to_path_buf(),
                });
            }
            entry.name = name.clone();
            self.entries.insert(name, entry);
        }
        Ok(())
    }

    /// Load a tree from a single product config file or a directory of them
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }

        let mut tree = ManifestTree::default();
        if path.is_file() {
            tree.merge_file(path)?;
            return Ok(tree);
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == PRODUCT_CONFIG_FILE)
            .map(|e| e.into_path())
            .collect();
        files.sort();

        for file in &files {
            tracing::debug!("Reading manifest metadata from {}", file.display());
            tree.merge_file(file)?;
        }

        tracing::debug!(
            "Loaded {} manifest(s) from {} product config file(s)",
            tree.len(),
            files.len()
        );
        Ok(tree)
    }
}

/// Errors that can occur while loading manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest source not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<YamlError>,
    },

    #[error("Manifest {name} defined more than once (again in {path})")]
    Duplicate { name: String, path: PathBuf },

    #[error("Git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can produce the manifest tree
pub trait ManifestSource {
    fn load(&self) -> Result<ManifestTree, ManifestError>;

    /// Short description for log output
    fn describe(&self) -> String;
}

/// Manifests read from a local directory or file
#[derive(Debug, Clone)]
pub struct LocalManifests {
    path: PathBuf,
}

impl LocalManifests {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestSource for LocalManifests {
    fn load(&self) -> Result<ManifestTree, ManifestError> {
        ManifestTree::load(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Manifests read from a clone of a remote manifest repository
#[derive(Debug, Clone)]
pub struct GitManifests {
    url: String,
    checkout: PathBuf,
}

impl GitManifests {
    pub fn new(url: impl Into<String>, checkout: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            checkout: checkout.into(),
        }
    }

    /// Clone the repository, or bring an existing clone up to date
    fn sync(&self) -> Result<(), ManifestError> {
        if self.checkout.exists() {
            let current = git(&self.checkout, &["ls-remote", "--get-url", "origin"])
                .map(|url| url.trim().to_string())
                .unwrap_or_default();
            if current != self.url {
                tracing::info!(
                    "Manifest checkout {} points at {:?}, re-cloning",
                    self.checkout.display(),
                    current
                );
                std::fs::remove_dir_all(&self.checkout)?;
            }
        }

        if !self.checkout.exists() {
            if let Some(parent) = self.checkout.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            // Relative checkout paths resolve against the process directory
            let target = self.checkout.to_string_lossy().into_owned();
            git(Path::new("."), &["clone", &self.url, &target])?;
        }

        tracing::info!("Updating manifest repository {}", self.url);
        git(&self.checkout, &["fetch", "--all"])?;
        git(&self.checkout, &["checkout", "-B", "master", "origin/master"])?;
        Ok(())
    }
}

impl ManifestSource for GitManifests {
    fn load(&self) -> Result<ManifestTree, ManifestError> {
        self.sync()?;
        ManifestTree::load(&self.checkout)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Whether a manifest project argument names a remote repository
pub fn is_remote(source: &str) -> bool {
    source.contains("://") || (source.starts_with("git@") && source.contains(':'))
}

fn git(dir: &Path, args: &[&str]) -> Result<String, ManifestError> {
    tracing::debug!("git {} (in {})", args.join(" "), dir.display());
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| ManifestError::Git(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ManifestError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
