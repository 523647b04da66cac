//! Restriction scanning
//!
//! Narrows the manifest tree down to the restricted manifests a change lands
//! in, then drops parents whose child release is also restricted. Approval
//! flows child→parent only: a change approved for a child release may go into
//! the parent, so the parent's own approval ticket is never consulted when the
//! child is in the set.

use std::collections::BTreeSet;

use crate::core::manifest::{ManifestEntry, ManifestTree};

/// Restricted manifests the given project/branch participates in
pub fn scan<'a>(tree: &'a ManifestTree, project: &str, branch: &str) -> Vec<&'a ManifestEntry> {
    let mut restricted = Vec::new();

    for manifest in tree.iter().filter(|m| m.restricted) {
        if manifest.approval_ticket.is_none() {
            tracing::warn!(
                "No approval ticket for restricted manifest {}",
                manifest.name
            );
            continue;
        }

        if manifest.is_unrestricted(project) {
            tracing::info!(
                "Project {} is unrestricted in manifest {}",
                project,
                manifest.name
            );
            continue;
        }

        match manifest.branch_for(project) {
            None => {
                tracing::debug!("Project {} not found in {}", project, manifest.name);
                continue;
            }
            Some(project_branch) if project_branch != branch => {
                tracing::debug!(
                    "Project {} on branch {} in {}, not {}",
                    project,
                    project_branch,
                    manifest.name,
                    branch
                );
                continue;
            }
            Some(_) => {}
        }

        tracing::info!(
            "Project: {} Branch: {} is in restricted manifest: {}",
            project,
            branch,
            manifest.name
        );
        restricted.push(manifest);
    }

    restricted
}

/// Remove every manifest that is the parent of another manifest in the set
pub fn reduce<'a>(restricted: &[&'a ManifestEntry]) -> Vec<&'a ManifestEntry> {
    let parents: BTreeSet<&str> = restricted
        .iter()
        .filter_map(|m| m.parent.as_deref())
        .collect();

    restricted
        .iter()
        .copied()
        .filter(|m| {
            let is_parent = parents.contains(m.name.as_str());
            if is_parent {
                tracing::info!(
                    "Not checking manifest {} because it is a parent of another restricted manifest",
                    m.name
                );
            }
            !is_parent
        })
        .collect()
}
