//! Enumeration of the installed modules.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use getset::Getters;

use crate::{config::MountConfig, MountError, MountResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A module directory found under the module root.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Module {
    /// The directory name of the module.
    name: OsString,

    /// The module's root directory.
    root: PathBuf,

    /// Whether the disable marker is present.
    disabled: bool,

    /// Whether the skip-mount marker is present.
    skip_mount: bool,

    /// The module's `system` subtree, if it exists as a directory.
    system_dir: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Module {
    /// Inspects the module rooted at `root`.
    pub fn inspect(root: impl Into<PathBuf>, config: &MountConfig) -> Self {
        let root = root.into();
        let name = root.file_name().map(OsString::from).unwrap_or_default();
        let disabled = root.join(config.get_disable_marker()).exists();
        let skip_mount = root.join(config.get_skip_mount_marker()).exists();
        let system_dir = Some(root.join(config.get_system_subdir())).filter(|p| p.is_dir());

        Self {
            name,
            root,
            disabled,
            skip_mount,
            system_dir,
        }
    }

    /// Returns `true` if the module contributes its `system` subtree to the mount.
    pub fn is_mountable(&self) -> bool {
        !self.disabled && !self.skip_mount && self.system_dir.is_some()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Lists every module directory under the configured module root, sorted by name.
///
/// The order is the merge order of the tree builder: when two modules provide the same path,
/// the one listed first wins.
///
/// ## Errors
/// Returns [`MountError::ReadDir`] if the module root cannot be read.
pub fn enumerate_modules(config: &MountConfig) -> MountResult<Vec<Module>> {
    let module_dir = config.get_module_dir();
    let mut modules = Vec::new();

    for entry in read_dir(module_dir)? {
        let entry = entry.map_err(|e| MountError::ReadDir {
            path: module_dir.clone(),
            source: e,
        })?;

        // Follows symlinks, so a module linked into the root is still a module.
        if !entry.path().is_dir() {
            continue;
        }

        modules.push(Module::inspect(entry.path(), config));
    }

    modules.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(modules)
}

fn read_dir(path: &Path) -> MountResult<fs::ReadDir> {
    fs::read_dir(path).map_err(|e| MountError::ReadDir {
        path: path.to_path_buf(),
        source: e,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test_log::test]
    fn test_modules_enumerate_sorted_with_markers() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let module_dir = temp.path().join("modules");

        fs::create_dir_all(module_dir.join("zeta/system"))?;
        fs::create_dir_all(module_dir.join("alpha/system"))?;
        fs::create_dir_all(module_dir.join("disabled/system"))?;
        fs::write(module_dir.join("disabled/disable"), "")?;
        fs::create_dir_all(module_dir.join("skipped/system"))?;
        fs::write(module_dir.join("skipped/skip_mount"), "")?;
        fs::create_dir_all(module_dir.join("nosystem"))?;
        fs::write(module_dir.join("stray_file"), "")?;

        let config = MountConfig::builder().module_dir(&module_dir).build();
        let modules = enumerate_modules(&config)?;

        let names: Vec<_> = modules.iter().map(|m| m.get_name().clone()).collect();
        assert_eq!(
            names,
            ["alpha", "disabled", "nosystem", "skipped", "zeta"].map(OsString::from)
        );

        let mountable: Vec<_> = modules
            .iter()
            .filter(|m| m.is_mountable())
            .map(|m| m.get_name().clone())
            .collect();
        assert_eq!(mountable, ["alpha", "zeta"].map(OsString::from));

        let disabled = &modules[1];
        assert!(*disabled.get_disabled());
        assert!(!*disabled.get_skip_mount());

        let skipped = &modules[3];
        assert!(*skipped.get_skip_mount());

        assert!(modules[2].get_system_dir().is_none());
        assert_eq!(
            modules[0].get_system_dir().as_deref(),
            Some(module_dir.join("alpha/system").as_path())
        );

        Ok(())
    }

    #[test_log::test]
    fn test_modules_missing_root_is_an_error() {
        let config = MountConfig::builder()
            .module_dir("/nonexistent/magicmount/modules")
            .build();

        assert!(matches!(
            enumerate_modules(&config),
            Err(MountError::ReadDir { .. })
        ));
    }
}
