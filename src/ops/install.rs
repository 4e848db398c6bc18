//! Install planning and execution.
//!
//! `install_all` first builds a plan of per-library actions, then executes
//! the non-skip actions on a rayon pool grouped by normalized repository
//! URL — libraries sharing a mirror serialize within their group — and
//! finally writes the lockfile once, in manifest order, with every
//! successful entry and none of the failed ones.

use std::collections::HashMap;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::core::config::ImportSpec;
use crate::core::lock::{InstallStatus, LockEntry, ValidationStatus};
use crate::error::{Error, Result};
use crate::extract::license::compatibility_warning;
use crate::ops::{timestamp, Installer};
use crate::util::hash::normalize_repo_url;
use crate::util::paths;

/// Planned handling for one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    /// Not in the lockfile yet.
    Install,

    /// Upstream ref moved past the locked commit.
    Update,

    /// Forced, configuration changed, or files missing on disk.
    Reinstall,

    /// Up-to-date; nothing to do.
    Skip,

    /// Up-to-date locally; ask the upstream whether the ref moved.
    CheckRemote,
}

/// Result of a batch install.
#[derive(Debug, Default)]
pub struct InstallOutcome {
    /// Libraries that were installed, updated, or reinstalled.
    pub changed: IndexMap<String, LockEntry>,

    /// Libraries that were already up-to-date.
    pub up_to_date: IndexMap<String, LockEntry>,
}

struct WorkItem {
    name: String,
    spec: ImportSpec,
    action: InstallAction,
    prior: Option<LockEntry>,
}

impl Installer {
    /// Install all libraries, or the named subset, per the planning rules.
    ///
    /// Per-library failures do not abort the batch: the lockfile is written
    /// with the successful subset and the failures are aggregated into one
    /// terminal `Installation` error.
    pub fn install_all(
        &self,
        names: Option<&[String]>,
        force: bool,
        check_remote: bool,
    ) -> Result<InstallOutcome> {
        let manifest = self.load_manifest()?;
        let mut lockfile = self.load_lockfile()?;

        let targets = select_targets(&manifest.imports, names)?;
        let plan = self.plan(&targets, &lockfile, force, check_remote);

        let mut outcome = InstallOutcome::default();
        let mut failures: Vec<(String, String)> = Vec::new();
        let mut work: Vec<WorkItem> = Vec::new();

        for (name, spec, action) in plan {
            match action {
                InstallAction::Skip => {
                    let entry = decorate_up_to_date(&lockfile.libraries[&name]);
                    outcome.up_to_date.insert(name, entry);
                }
                action => work.push(WorkItem {
                    prior: lockfile.libraries.get(&name).cloned(),
                    name,
                    spec,
                    action,
                }),
            }
        }

        // Group by normalized URL: distinct mirrors proceed in parallel,
        // libraries sharing a mirror run sequentially within their group.
        let mut groups: IndexMap<String, Vec<WorkItem>> = IndexMap::new();
        for item in work {
            groups
                .entry(normalize_repo_url(&item.spec.repo))
                .or_default()
                .push(item);
        }

        let group_results: Vec<Vec<(String, Result<Option<LockEntry>>)>> = groups
            .into_iter()
            .map(|(_, items)| items)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|items| {
                items
                    .into_iter()
                    .map(|item| {
                        let name = item.name.clone();
                        let result = self.execute(&manifest.library_root, item);
                        (name, result)
                    })
                    .collect()
            })
            .collect();

        let mut executed: HashMap<String, Result<Option<LockEntry>>> = HashMap::new();
        for (name, result) in group_results.into_iter().flatten() {
            executed.insert(name, result);
        }

        // Reassemble in manifest order for deterministic reporting.
        for name in targets.keys() {
            match executed.remove(name) {
                None => {}
                Some(Ok(Some(entry))) => {
                    outcome.changed.insert(name.clone(), entry);
                }
                Some(Ok(None)) => {
                    let entry = decorate_up_to_date(&lockfile.libraries[name]);
                    outcome.up_to_date.insert(name.clone(), entry);
                }
                Some(Err(err)) => {
                    tracing::warn!("failed to install {name}: {err}");
                    failures.push((name.clone(), err.to_string()));
                }
            }
        }

        // One lockfile write: successes merged, failures untouched, order
        // following the manifest with orphans preserved at the end.
        lockfile.library_root = manifest.library_root.clone();
        let mut rebuilt = IndexMap::new();
        for name in manifest.imports.keys() {
            if let Some(entry) = outcome.changed.get(name) {
                rebuilt.insert(name.clone(), entry.clone());
            } else if let Some(entry) = lockfile.libraries.get(name) {
                rebuilt.insert(name.clone(), entry.clone());
            }
        }
        for (name, entry) in &lockfile.libraries {
            if !manifest.imports.contains_key(name) {
                rebuilt.insert(name.clone(), entry.clone());
            }
        }
        lockfile.libraries = rebuilt;
        self.save_lockfile(&lockfile)?;

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(Error::Installation { failures })
        }
    }

    /// Apply the planning rules to each targeted library, in manifest
    /// order.
    fn plan(
        &self,
        targets: &IndexMap<String, ImportSpec>,
        lockfile: &crate::core::lock::Lockfile,
        force: bool,
        check_remote: bool,
    ) -> Vec<(String, ImportSpec, InstallAction)> {
        let mut plan = Vec::new();

        for (name, spec) in targets {
            let action = if force {
                InstallAction::Reinstall
            } else {
                match lockfile.libraries.get(name) {
                    None => InstallAction::Install,
                    Some(entry) if entry.config_changed(spec) => InstallAction::Reinstall,
                    Some(entry) if !self.destination_present(entry) => InstallAction::Reinstall,
                    Some(entry) if spec.is_pinned() && entry.commit == spec.reference => {
                        InstallAction::Skip
                    }
                    Some(_) if check_remote => InstallAction::CheckRemote,
                    Some(_) => InstallAction::Skip,
                }
            };
            tracing::debug!("plan: {name} -> {action:?}");
            plan.push((name.clone(), spec.clone(), action));
        }
        plan
    }

    fn destination_present(&self, entry: &LockEntry) -> bool {
        let candidate = self.project_root().join(&entry.local_path);
        match paths::confine_to_project(self.project_root(), &candidate) {
            Ok(resolved) => resolved.exists(),
            Err(_) => false,
        }
    }

    /// Run mirror + extract for one library and build its lock entry.
    ///
    /// Returns `Ok(None)` when a remote check finds the library already at
    /// the upstream tip.
    fn execute(&self, library_root: &str, item: WorkItem) -> Result<Option<LockEntry>> {
        let WorkItem {
            name,
            spec,
            mut action,
            prior,
        } = item;

        if action == InstallAction::CheckRemote {
            let upstream = self.mirrors().resolve_remote(&spec.repo, &spec.reference)?;
            let locked = prior.as_ref().map(|entry| entry.commit.as_str());
            if Some(upstream.as_str()) == locked {
                return Ok(None);
            }
            action = InstallAction::Update;
        }

        let state = self.mirrors().update_mirror(&spec.repo, &spec.reference)?;
        let outcome = self.extractor().extract(
            &name,
            &spec,
            &self.mirrors().mirror_path(&spec.repo),
            library_root,
            &state.resolved_commit,
        )?;

        let install_status = match action {
            InstallAction::Install => InstallStatus::Installed,
            InstallAction::Update => InstallStatus::Updated,
            _ => match &prior {
                Some(entry) if entry.commit != state.resolved_commit => InstallStatus::Updated,
                _ => InstallStatus::Reinstalled,
            },
        };

        let license_change = prior.as_ref().and_then(|entry| {
            if entry.detected_license != outcome.detected_license {
                Some(format!(
                    "license changed: {} -> {}",
                    entry.detected_license.as_deref().unwrap_or("None"),
                    outcome.detected_license.as_deref().unwrap_or("None"),
                ))
            } else {
                None
            }
        });

        let now = timestamp();
        Ok(Some(LockEntry {
            repo: spec.repo.clone(),
            reference: spec.reference.clone(),
            source_path: spec.source_path.clone(),
            local_path: outcome.local_path,
            checkin: spec.checkin,
            ignore_patterns: spec.ignore_patterns.clone(),
            license: spec.license.clone().or_else(|| outcome.detected_license.clone()),
            commit: state.resolved_commit,
            checksum: outcome.checksum,
            installed_at: prior
                .as_ref()
                .map(|entry| entry.installed_at.clone())
                .unwrap_or_else(|| now.clone()),
            updated_at: now,
            license_warning: compatibility_warning(outcome.detected_license.as_deref()),
            detected_license: outcome.detected_license,
            license_file: outcome.license_file,
            install_status,
            validation_status: ValidationStatus::Unknown,
            license_change,
            extra: prior.map(|entry| entry.extra).unwrap_or_default(),
        }))
    }

    pub(crate) fn extractor(&self) -> &crate::extract::Extractor {
        &self.extractor
    }
}

/// Restrict the manifest's imports to the requested names, preserving
/// manifest order. Unknown names are a configuration error.
fn select_targets(
    imports: &IndexMap<String, ImportSpec>,
    names: Option<&[String]>,
) -> Result<IndexMap<String, ImportSpec>> {
    let Some(names) = names else {
        return Ok(imports.clone());
    };

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| !imports.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Config(format!(
            "libraries not found in configuration: {}",
            unknown.join(", ")
        )));
    }

    Ok(imports
        .iter()
        .filter(|(name, _)| names.contains(name))
        .map(|(name, spec)| (name.clone(), spec.clone()))
        .collect())
}

/// Report view of an unchanged library.
fn decorate_up_to_date(entry: &LockEntry) -> LockEntry {
    let mut decorated = entry.clone();
    decorated.install_status = InstallStatus::UpToDate;
    decorated.license_warning = compatibility_warning(decorated.detected_license.as_deref());
    decorated
}
