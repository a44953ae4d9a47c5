use std::{
    fs,
    path::{Path, PathBuf},
};

use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{MountError, MountResult};

use super::{
    DEFAULT_DISABLE_MARKER, DEFAULT_MODULE_DIR, DEFAULT_OPAQUE_XATTR, DEFAULT_PARTITIONS,
    DEFAULT_ROOT_DIR, DEFAULT_SKIP_MOUNT_MARKER, DEFAULT_SYSTEM_SUBDIR, DEFAULT_TEMP_DIRS,
    DEFAULT_TMPFS_SOURCE, STAGING_SUBDIR, WORK_SUBDIR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything the tree builder and the mount executor need to know about the device layout.
///
/// All fields have defaults matching a stock Android device, so an empty TOML file or
/// `MountConfig::default()` is a valid configuration.
///
/// ## Example
/// ```
/// use magicmount::config::MountConfig;
///
/// let config = MountConfig::builder()
///     .module_dir("/data/adb/modules")
///     .work_dir("/debug_ramdisk/workdir")
///     .build();
///
/// assert_eq!(config.get_skip_mount_marker(), "skip_mount");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
#[serde(default)]
pub struct MountConfig {
    /// The real filesystem root the tree is composed onto.
    #[builder(default = PathBuf::from(DEFAULT_ROOT_DIR), setter(into))]
    root_dir: PathBuf,

    /// The directory containing one subdirectory per module.
    #[builder(default = PathBuf::from(DEFAULT_MODULE_DIR), setter(into))]
    module_dir: PathBuf,

    /// Marker file name that disables a module.
    #[builder(default = DEFAULT_DISABLE_MARKER.to_string(), setter(into))]
    disable_marker: String,

    /// Marker file name that excludes a module from mounting.
    #[builder(default = DEFAULT_SKIP_MOUNT_MARKER.to_string(), setter(into))]
    skip_mount_marker: String,

    /// The module subtree that maps onto `/system`.
    #[builder(default = DEFAULT_SYSTEM_SUBDIR.to_string(), setter(into))]
    system_subdir: String,

    /// The extended attribute that marks a module directory as opaque.
    #[builder(default = DEFAULT_OPAQUE_XATTR.to_string(), setter(into))]
    opaque_xattr: String,

    /// Partitions eligible for promotion out of `/system`.
    #[builder(default = Partition::defaults())]
    partitions: Vec<Partition>,

    /// The staging area. Resolved from the default temp dirs when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    work_dir: Option<PathBuf>,

    /// The source name of the staging tmpfs.
    #[builder(default = DEFAULT_TMPFS_SOURCE.to_string(), setter(into))]
    tmpfs_source: String,
}

/// A partition that may be mounted at its own top-level path instead of under `/system`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Partition {
    /// The partition name, e.g. `vendor`.
    name: String,

    /// Whether `/system/<name>` must be a symlink for the partition to be promoted.
    #[serde(default)]
    require_symlink: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MountConfig {
    /// Loads a configuration from a TOML file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> MountResult<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| MountError::fs("read config", path, e))?;
        let config = toml::from_str(&contents)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Overrides the module directory.
    pub fn set_module_dir(&mut self, module_dir: impl Into<PathBuf>) {
        self.module_dir = module_dir.into();
    }

    /// Overrides the real filesystem root.
    pub fn set_root_dir(&mut self, root_dir: impl Into<PathBuf>) {
        self.root_dir = root_dir.into();
    }

    /// Overrides the staging area.
    pub fn set_work_dir(&mut self, work_dir: impl Into<PathBuf>) {
        self.work_dir = Some(work_dir.into());
    }

    /// Returns the staging area, falling back to the first existing default temp dir.
    pub fn resolve_work_dir(&self) -> MountResult<PathBuf> {
        if let Some(work_dir) = &self.work_dir {
            return Ok(work_dir.clone());
        }

        DEFAULT_TEMP_DIRS
            .iter()
            .map(Path::new)
            .find(|dir| dir.exists())
            .map(|dir| dir.join(WORK_SUBDIR))
            .ok_or_else(|| {
                MountError::NoStagingArea(DEFAULT_TEMP_DIRS.iter().map(PathBuf::from).collect())
            })
    }

    /// Returns the directory the staging tmpfs is mounted on, a child of the work dir that a
    /// mount run owns exclusively.
    pub fn resolve_staging_dir(&self) -> MountResult<PathBuf> {
        Ok(self.resolve_work_dir()?.join(STAGING_SUBDIR))
    }

    /// Returns the real path of a path given relative to the filesystem root.
    pub fn real_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root_dir.join(relative)
    }
}

impl Partition {
    /// Creates a new partition entry.
    pub fn new(name: impl Into<String>, require_symlink: bool) -> Self {
        Self {
            name: name.into(),
            require_symlink,
        }
    }

    /// The stock Android partitions.
    pub fn defaults() -> Vec<Partition> {
        DEFAULT_PARTITIONS
            .iter()
            .map(|(name, require_symlink)| Partition::new(*name, *require_symlink))
            .collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for MountConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test_log::test]
    fn test_mount_config_defaults() {
        let config = MountConfig::default();

        assert_eq!(config.get_root_dir(), Path::new("/"));
        assert_eq!(config.get_module_dir(), Path::new("/data/adb/modules"));
        assert_eq!(config.get_disable_marker(), "disable");
        assert_eq!(config.get_skip_mount_marker(), "skip_mount");
        assert_eq!(config.get_opaque_xattr(), "trusted.overlay.opaque");
        assert_eq!(config.get_tmpfs_source(), "APatch");
        assert!(config.get_work_dir().is_none());

        let names: Vec<_> = config
            .get_partitions()
            .iter()
            .map(|p| p.get_name().as_str())
            .collect();
        assert_eq!(names, ["vendor", "system_ext", "product", "odm", "oem"]);
        assert!(config
            .get_partitions()
            .iter()
            .filter(|p| *p.get_require_symlink())
            .all(|p| ["vendor", "system_ext", "product"].contains(&p.get_name().as_str())));
    }

    #[test_log::test]
    fn test_mount_config_load_partial_toml() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("magicmount.toml");
        fs::write(
            &path,
            r#"
module_dir = "/data/adb/other_modules"
work_dir = "/dev/magic"

[[partitions]]
name = "vendor"
require_symlink = true
"#,
        )?;

        let config = MountConfig::load(&path)?;
        assert_eq!(config.get_module_dir(), Path::new("/data/adb/other_modules"));
        assert_eq!(config.resolve_work_dir()?, PathBuf::from("/dev/magic"));
        assert_eq!(
            config.resolve_staging_dir()?,
            PathBuf::from("/dev/magic/overlay_tmp")
        );
        assert_eq!(config.get_partitions(), &vec![Partition::new("vendor", true)]);
        assert_eq!(config.get_skip_mount_marker(), "skip_mount");

        Ok(())
    }

    #[test_log::test]
    fn test_mount_config_load_rejects_bad_toml() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("broken.toml");
        fs::write(&path, "module_dir = [")?;

        assert!(matches!(
            MountConfig::load(&path),
            Err(MountError::InvalidConfig(_))
        ));

        Ok(())
    }

    #[test_log::test]
    fn test_mount_config_real_path() {
        let config = MountConfig::builder().root_dir("/mnt/root").build();
        assert_eq!(
            config.real_path("system/bin"),
            PathBuf::from("/mnt/root/system/bin")
        );
    }
}
