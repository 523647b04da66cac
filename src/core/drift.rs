//! Compliance manifest drift detection
//!
//! Built dependency packages record the exact package versions of each target
//! platform in `env/environment-<platform>.txt`. The compliance manifest lists
//! the third-party components (and versions) that ship. This module compares
//! the two and classifies every difference.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::yaml::{parse_yaml_file, YamlError};

/// Platforms a dependency package is built for by default
pub const DEFAULT_PLATFORMS: &[&str] = &[
    "linux-x86_64",
    "linux-aarch64",
    "macosx-x86_64",
    "macosx-arm64",
    "windows-amd64",
];

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{archive} does not contain {member}")]
    MissingMember { archive: PathBuf, member: String },

    #[error("Malformed line in {path}: {line:?}")]
    Malformed { path: PathBuf, line: String },

    #[error("Failed to parse compliance manifest: {0}")]
    Manifest(Box<YamlError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Package → version for one platform
pub type Environment = BTreeMap<String, String>;

/// Environments keyed by platform
pub type Environments = BTreeMap<String, Environment>;

/// A version as written in the compliance manifest (YAML may type it as a number)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawVersion> for String {
    fn from(v: RawVersion) -> Self {
        match v {
            RawVersion::Text(s) => s,
            RawVersion::Int(i) => i.to_string(),
            RawVersion::Float(f) => f.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawComponent {
    #[serde(default)]
    versions: Vec<RawVersion>,
}

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    components: BTreeMap<String, Option<RawComponent>>,
}

/// Components listed in the compliance manifest, with normalized versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceManifest {
    pub components: BTreeMap<String, Vec<String>>,
}

impl ComplianceManifest {
    pub fn load(path: &Path) -> Result<Self, DriftError> {
        let raw: RawManifest =
            parse_yaml_file(path).map_err(|e| DriftError::Manifest(Box::new(e)))?;
        Ok(Self {
            components: raw
                .components
                .into_iter()
                .map(|(name, component)| {
                    let versions = component
                        .unwrap_or_default()
                        .versions
                        .into_iter()
                        .map(|v| raw_version(&String::from(v)).to_string())
                        .collect();
                    (name, versions)
                })
                .collect(),
        })
    }
}

/// Version string minus any leading `v`/`V`
pub fn raw_version(v: &str) -> &str {
    v.strip_prefix(['v', 'V']).unwrap_or(v)
}

/// Parse an environment listing: `<package> <version> ...` per line, `#` comments
pub fn parse_environment(reader: impl BufRead, source: &Path) -> Result<Environment, DriftError> {
    let mut env = Environment::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(package), Some(version)) => {
                env.insert(package.to_string(), version.to_string());
            }
            _ => {
                return Err(DriftError::Malformed {
                    path: source.to_path_buf(),
                    line: line.clone(),
                })
            }
        }
    }
    Ok(env)
}

/// Archive file name of a package build for one platform
pub fn archive_name(package: &str, platform: &str, version: &str) -> String {
    format!("{}-{}-{}.tgz", package, platform, version)
}

/// Read the environment listing of one platform out of a package archive
pub fn read_archive_environment(archive: &Path, platform: &str) -> Result<Environment, DriftError> {
    let member = format!("env/environment-{}.txt", platform);
    tracing::info!("Reading environment from {}", archive.display());

    let file = File::open(archive).map_err(|source| DriftError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let normalized = path.strip_prefix(".").unwrap_or(&path);
        if normalized != Path::new(&member) {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        return parse_environment(content.as_bytes(), &archive.join(&member));
    }

    Err(DriftError::MissingMember {
        archive: archive.to_path_buf(),
        member,
    })
}

/// Read the environments of every platform from `<dir>/<package>-<platform>-<version>.tgz`
pub fn load_environments(
    dir: &Path,
    package: &str,
    version: &str,
    platforms: &[String],
) -> Result<Environments, DriftError> {
    platforms
        .iter()
        .map(|platform| {
            let archive = dir.join(archive_name(package, platform, version));
            read_archive_environment(&archive, platform).map(|env| (platform.clone(), env))
        })
        .collect()
}

fn open_lines(path: &Path) -> Result<Vec<String>, DriftError> {
    let file = File::open(path).map_err(|source| DriftError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()
        .map_err(DriftError::from)
}

/// Names listed one per line, ignoring `#` comments and blank lines
pub fn read_name_list(path: &Path) -> Result<BTreeSet<String>, DriftError> {
    Ok(open_lines(path)?
        .into_iter()
        .filter(|l| !l.starts_with('#'))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// `name=version` requirements-style listing
pub fn read_dependencies_file(path: &Path) -> Result<BTreeMap<String, String>, DriftError> {
    let mut deps = BTreeMap::new();
    for line in open_lines(path)? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((dep, ver)) = line.split_once('=') else {
            return Err(DriftError::Malformed {
                path: path.to_path_buf(),
                line: line.to_string(),
            });
        };
        deps.insert(dep.trim().to_string(), ver.trim().to_string());
    }
    tracing::debug!("Read {} dependencies from {}", deps.len(), path.display());
    Ok(deps)
}

/// A dependency whose built version is not recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drifted {
    pub version: String,
    pub manifest_versions: Vec<String>,
}

/// Differences between built environments and the compliance manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Built but absent from the manifest
    pub missing: BTreeMap<String, String>,

    /// Built with a version the manifest does not list
    pub drifted: BTreeMap<String, Drifted>,

    /// In the manifest but in no built environment
    pub removed: BTreeSet<String>,

    /// Ignore-list entries that no environment contains any more
    pub unnecessary_ignored: BTreeSet<String>,
}

impl DriftReport {
    /// Whether the manifest needs updating
    pub fn has_errors(&self) -> bool {
        !self.missing.is_empty() || !self.drifted.is_empty() || !self.removed.is_empty()
    }
}

/// Compare built environments against the compliance manifest
pub fn detect_drift(
    environments: &Environments,
    manifest: &ComplianceManifest,
    ignored: &BTreeSet<String>,
    stubs: &BTreeSet<String>,
) -> DriftReport {
    let mut report = DriftReport::default();
    let mut actually_ignored = BTreeSet::new();

    for env in environments.values() {
        for (dep, version) in env {
            if ignored.contains(dep) {
                actually_ignored.insert(dep.clone());
                continue;
            }
            if stubs.contains(dep) {
                continue;
            }
            let Some(manifest_versions) = manifest.components.get(dep) else {
                report.missing.insert(dep.clone(), version.clone());
                continue;
            };
            if !manifest_versions.contains(version) {
                report.drifted.insert(
                    dep.clone(),
                    Drifted {
                        version: version.clone(),
                        manifest_versions: manifest_versions.clone(),
                    },
                );
            }
        }
    }

    for component in manifest.components.keys() {
        if !environments.values().any(|env| env.contains_key(component)) {
            report.removed.insert(component.clone());
        }
    }

    report.unnecessary_ignored = ignored.difference(&actually_ignored).cloned().collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn manifest(pairs: &[(&str, &str)]) -> ComplianceManifest {
        ComplianceManifest {
            components: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn write_archive(path: &Path, member: &str, content: &str) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, member, content.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_raw_version() {
        assert_eq!(raw_version("v1.2.3"), "1.2.3");
        assert_eq!(raw_version("V2"), "2");
        assert_eq!(raw_version("1.0"), "1.0");
        assert_eq!(raw_version(""), "");
    }

    #[test]
    fn test_parse_environment_skips_comments() {
        let text = "# conda environment\nopenssl 3.0.13 h1234\n\nzlib   1.3\n";
        let parsed = parse_environment(text.as_bytes(), Path::new("env.txt")).unwrap();
        assert_eq!(parsed, env(&[("openssl", "3.0.13"), ("zlib", "1.3")]));
    }

    #[test]
    fn test_parse_environment_rejects_single_field() {
        let err = parse_environment("openssl\n".as_bytes(), Path::new("env.txt")).unwrap_err();
        assert!(matches!(err, DriftError::Malformed { .. }));
    }

    #[test]
    fn test_detect_drift_classifies_every_difference() {
        let environments: Environments = [
            (
                "linux-x86_64".to_string(),
                env(&[
                    ("openssl", "3.0.13"),
                    ("zlib", "1.3"),
                    ("newlib", "0.1"),
                    ("pip", "24.0"),
                    ("cb-stub", "1"),
                ]),
            ),
            ("windows-amd64".to_string(), env(&[("openssl", "3.0.14")])),
        ]
        .into_iter()
        .collect();
        let manifest = manifest(&[("openssl", "3.0.13"), ("zlib", "1.3"), ("gone", "2.0")]);

        let report = detect_drift(
            &environments,
            &manifest,
            &set(&["pip", "setuptools"]),
            &set(&["cb-stub"]),
        );

        assert_eq!(report.missing, env(&[("newlib", "0.1")]));
        assert_eq!(
            report.drifted.get("openssl"),
            Some(&Drifted {
                version: "3.0.14".into(),
                manifest_versions: vec!["3.0.13".into()],
            })
        );
        assert!(!report.drifted.contains_key("zlib"));
        assert_eq!(report.removed, set(&["gone"]));
        assert_eq!(report.unnecessary_ignored, set(&["setuptools"]));
        assert!(report.has_errors());
    }

    #[test]
    fn test_stale_ignore_alone_is_not_an_error() {
        let environments: Environments =
            [("linux-x86_64".to_string(), env(&[("zlib", "1.3")]))].into_iter().collect();
        let report = detect_drift(
            &environments,
            &manifest(&[("zlib", "1.3")]),
            &set(&["old-thing"]),
            &BTreeSet::new(),
        );
        assert!(!report.has_errors());
        assert_eq!(report.unnecessary_ignored, set(&["old-thing"]));
    }

    #[test]
    fn test_compliance_manifest_normalizes_versions() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("black-duck-manifest.yaml.in");
        std::fs::write(
            &path,
            "components:\n  openssl:\n    versions: [v3.0.13]\n  zlib:\n    versions: [1.3]\n  numpy:\n    versions: [2]\n  empty:\n",
        )
        .unwrap();

        let m = ComplianceManifest::load(&path).unwrap();
        assert_eq!(m.components["openssl"], vec!["3.0.13"]);
        assert_eq!(m.components["zlib"], vec!["1.3"]);
        assert_eq!(m.components["numpy"], vec!["2"]);
        assert!(m.components["empty"].is_empty());
    }

    #[test]
    fn test_read_archive_environment() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join(archive_name("cbpy", "linux-x86_64", "7.6.0-cb1"));
        write_archive(
            &archive,
            "./env/environment-linux-x86_64.txt",
            "# header\nopenssl 3.0.13\n",
        );

        let parsed = read_archive_environment(&archive, "linux-x86_64").unwrap();
        assert_eq!(parsed, env(&[("openssl", "3.0.13")]));

        let err = read_archive_environment(&archive, "windows-amd64").unwrap_err();
        assert!(matches!(err, DriftError::MissingMember { .. }));
    }

    #[test]
    fn test_read_name_list_and_dependencies() {
        let tmp = tempdir().unwrap();
        let ignore = tmp.path().join("blackduck-ignore.txt");
        std::fs::write(&ignore, "# ignored\npip\n\nsetuptools \n").unwrap();
        assert_eq!(read_name_list(&ignore).unwrap(), set(&["pip", "setuptools"]));

        let stubs = tmp.path().join("cb-stubs.txt");
        std::fs::write(&stubs, "# stubs\ncb-stub=1.0\n").unwrap();
        let deps = read_dependencies_file(&stubs).unwrap();
        assert_eq!(deps.get("cb-stub").map(String::as_str), Some("1.0"));

        std::fs::write(&stubs, "no-version\n").unwrap();
        assert!(read_dependencies_file(&stubs).is_err());
    }
}
