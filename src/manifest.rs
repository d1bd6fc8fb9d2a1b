//! # Dependency Manifest Merging
//!
//! After synchronization every repository's `package.json` is folded into one
//! workspace-level manifest so that a single install resolves the dependencies
//! of all repositories together.
//!
//! ## Rules
//!
//! - Repositories are merged in full-name order, which makes the result
//!   independent of the order in which clones finished.
//! - The first declaration of a dependency wins. A later, different version
//!   requirement is recorded as a [`DependencyConflict`].
//! - A package declared both as a runtime and a development dependency is kept
//!   as a runtime dependency only.
//! - Each workspace package (a repository whose manifest declares a `name`) is
//!   pinned to its local checkout at its head revision, both in the merged
//!   dependency entry and in the package-manager `overrides`. The install then
//!   never pulls a published copy of a package the workspace already contains.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Per-repository manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// Package-manager configuration written next to the merged manifest.
pub const PACKAGE_MANAGER_CONFIG_FILE: &str = "pnpm-workspace.yaml";

/// Name given to the merged workspace manifest.
pub const WORKSPACE_PACKAGE_NAME: &str = "polyrepo-workspace";

/// The part of a `package.json` the merge reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Read `package.json` from `directory`. A missing file is `Ok(None)`.
    pub fn read(directory: &Path) -> Result<Option<Self>> {
        let path = directory.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Manifest {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// One synchronized repository's contribution to the merge.
#[derive(Debug, Clone)]
pub struct LocalPackage {
    /// Full name of the repository the manifest came from.
    pub source: String,
    pub directory: PathBuf,
    pub head_revision: String,
    pub manifest: PackageManifest,
}

impl LocalPackage {
    /// `git+file:` specifier pinning this checkout at its head revision.
    pub fn local_specifier(&self) -> Result<String> {
        let absolute = if self.directory.is_absolute() {
            self.directory.clone()
        } else {
            std::env::current_dir()?.join(&self.directory)
        };
        let url = Url::from_file_path(&absolute).map_err(|_| Error::Manifest {
            path: absolute.display().to_string(),
            message: "cannot express directory as a file URL".to_string(),
        })?;
        Ok(format!("git+{}#{}", url, self.head_revision))
    }
}

/// Two repositories asked for different versions of the same package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConflict {
    pub package: String,
    /// Requirement that was kept, with the repository that declared it.
    pub kept: (String, String),
    /// Requirement that was dropped, with the repository that declared it.
    pub ignored: (String, String),
}

/// Result of merging every repository's declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedManifest {
    pub name: String,
    pub private: bool,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(skip)]
    pub overrides: BTreeMap<String, String>,
    #[serde(skip)]
    pub conflicts: Vec<DependencyConflict>,
}

#[derive(Serialize)]
struct PackageManagerConfig<'a> {
    overrides: &'a BTreeMap<String, String>,
}

/// Merge the manifests of `packages`.
pub fn merge(packages: &[LocalPackage]) -> Result<MergedManifest> {
    let mut ordered: Vec<&LocalPackage> = packages.iter().collect();
    ordered.sort_by(|a, b| a.source.to_lowercase().cmp(&b.source.to_lowercase()));

    let mut merged = MergedManifest {
        name: WORKSPACE_PACKAGE_NAME.to_string(),
        private: true,
        ..Default::default()
    };

    for package in &ordered {
        if let Some(name) = &package.manifest.name {
            if merged.overrides.contains_key(name) {
                warn!(
                    "Package '{}' is provided by more than one repository; keeping the first, ignoring {}",
                    name, package.source
                );
                continue;
            }
            merged
                .overrides
                .insert(name.clone(), package.local_specifier()?);
        }
    }

    // Declarations keyed by package name: (requirement, declaring repository).
    let mut runtime: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut development: BTreeMap<String, (String, String)> = BTreeMap::new();

    for package in &ordered {
        for (dep, requirement) in &package.manifest.dependencies {
            declare(&mut runtime, &mut merged.conflicts, dep, requirement, &package.source);
        }
        for (dep, requirement) in &package.manifest.dev_dependencies {
            declare(&mut development, &mut merged.conflicts, dep, requirement, &package.source);
        }
    }

    for (dep, (requirement, _)) in runtime {
        let pinned = merged.overrides.get(&dep).cloned().unwrap_or(requirement);
        merged.dependencies.insert(dep, pinned);
    }
    for (dep, (requirement, _)) in development {
        if merged.dependencies.contains_key(&dep) {
            continue;
        }
        let pinned = merged.overrides.get(&dep).cloned().unwrap_or(requirement);
        merged.dev_dependencies.insert(dep, pinned);
    }

    for conflict in &merged.conflicts {
        warn!(
            "Dependency '{}': keeping '{}' from {}, ignoring '{}' from {}",
            conflict.package, conflict.kept.0, conflict.kept.1, conflict.ignored.0, conflict.ignored.1
        );
    }

    Ok(merged)
}

fn declare(
    declared: &mut BTreeMap<String, (String, String)>,
    conflicts: &mut Vec<DependencyConflict>,
    dep: &str,
    requirement: &str,
    source: &str,
) {
    match declared.get(dep) {
        None => {
            declared.insert(dep.to_string(), (requirement.to_string(), source.to_string()));
        }
        Some((kept, kept_source)) if kept != requirement => {
            conflicts.push(DependencyConflict {
                package: dep.to_string(),
                kept: (kept.clone(), kept_source.clone()),
                ignored: (requirement.to_string(), source.to_string()),
            });
        }
        Some(_) => {}
    }
}

/// Write the merged manifest and the package-manager configuration to `root`.
pub fn write_workspace_files(root: &Path, merged: &MergedManifest) -> Result<()> {
    let manifest_path = root.join(MANIFEST_FILE);
    let mut manifest = serde_json::to_string_pretty(merged)?;
    manifest.push('\n');
    fs::write(&manifest_path, manifest)?;
    debug!("wrote {}", manifest_path.display());

    let config_path = root.join(PACKAGE_MANAGER_CONFIG_FILE);
    let config = serde_yaml::to_string(&PackageManagerConfig {
        overrides: &merged.overrides,
    })?;
    fs::write(&config_path, config)?;
    debug!("wrote {}", config_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package(source: &str, name: Option<&str>, deps: &[(&str, &str)], dev: &[(&str, &str)]) -> LocalPackage {
        let short = source.split('/').nth(1).unwrap();
        LocalPackage {
            source: source.to_string(),
            directory: PathBuf::from("/ws").join(short),
            head_revision: format!("{:0<40}", short),
            manifest: PackageManifest {
                name: name.map(str::to_string),
                dependencies: deps
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                dev_dependencies: dev
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_read_missing_manifest() {
        let temp = TempDir::new().unwrap();
        assert_eq!(PackageManifest::read(temp.path()).unwrap(), None);
    }

    #[test]
    fn test_read_manifest() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"name": "@acme/a", "version": "1.0.0", "dependencies": {"lodash": "^4.17.0"}, "devDependencies": {"jest": "^29"}, "scripts": {"test": "jest"}}"#,
        )
        .unwrap();

        let manifest = PackageManifest::read(temp.path()).unwrap().unwrap();
        assert_eq!(manifest.name.as_deref(), Some("@acme/a"));
        assert_eq!(manifest.dependencies["lodash"], "^4.17.0");
        assert_eq!(manifest.dev_dependencies["jest"], "^29");
    }

    #[test]
    fn test_read_invalid_manifest() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = PackageManifest::read(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = package("acme/a", Some("@acme/a"), &[("lodash", "^4.0.0")], &[]);
        let b = package("acme/b", Some("@acme/b"), &[("lodash", "^3.0.0")], &[]);

        let forward = merge(&[a.clone(), b.clone()]).unwrap();
        let backward = merge(&[b, a]).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward.dependencies["lodash"], "^4.0.0");
        assert_eq!(forward.conflicts.len(), 1);
        assert_eq!(forward.conflicts[0].ignored, ("^3.0.0".to_string(), "acme/b".to_string()));
    }

    #[test]
    fn test_merge_same_requirement_is_not_a_conflict() {
        let a = package("acme/a", None, &[("chalk", "^5.0.0")], &[]);
        let b = package("acme/b", None, &[("chalk", "^5.0.0")], &[]);
        let merged = merge(&[a, b]).unwrap();
        assert!(merged.conflicts.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_pins_workspace_packages() {
        let core = package("acme/core", Some("@acme/core"), &[], &[]);
        let app = package("acme/app", Some("@acme/app"), &[("@acme/core", "^2.0.0")], &[]);

        let merged = merge(&[core.clone(), app]).unwrap();

        let expected = format!("git+file:///ws/core#{}", core.head_revision);
        assert_eq!(merged.dependencies["@acme/core"], expected);
        assert_eq!(merged.overrides["@acme/core"], expected);
        assert!(merged.overrides.contains_key("@acme/app"));
        // Nothing depends on @acme/app, so it only appears as an override.
        assert!(!merged.dependencies.contains_key("@acme/app"));
    }

    #[test]
    fn test_merge_prefers_runtime_over_development() {
        let a = package("acme/a", None, &[], &[("typescript", "^5.4.0")]);
        let b = package("acme/b", None, &[("typescript", "^5.0.0")], &[]);

        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged.dependencies["typescript"], "^5.0.0");
        assert!(!merged.dev_dependencies.contains_key("typescript"));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_workspace_files() {
        let temp = TempDir::new().unwrap();
        let core = package("acme/core", Some("@acme/core"), &[("semver", "^7")], &[("vitest", "^1")]);
        let merged = merge(&[core]).unwrap();

        write_workspace_files(temp.path(), &merged).unwrap();

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["name"], WORKSPACE_PACKAGE_NAME);
        assert_eq!(manifest["private"], true);
        assert_eq!(manifest["dependencies"]["semver"], "^7");
        assert_eq!(manifest["devDependencies"]["vitest"], "^1");
        assert!(manifest.get("overrides").is_none());

        let config: serde_yaml::Value = serde_yaml::from_str(
            &fs::read_to_string(temp.path().join(PACKAGE_MANAGER_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        let pinned = config["overrides"]["@acme/core"].as_str().unwrap();
        assert!(pinned.starts_with("git+file:///ws/core#"));
    }
}
