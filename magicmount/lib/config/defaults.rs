//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The real filesystem root the module tree is composed onto.
pub const DEFAULT_ROOT_DIR: &str = "/";

/// The directory that holds one subdirectory per installed module.
pub const DEFAULT_MODULE_DIR: &str = "/data/adb/modules";

/// Marker file that disables a module entirely.
pub const DEFAULT_DISABLE_MARKER: &str = "disable";

/// Marker file that keeps a module enabled but excludes it from mounting.
pub const DEFAULT_SKIP_MOUNT_MARKER: &str = "skip_mount";

/// The subtree of a module that mirrors `/system`.
pub const DEFAULT_SYSTEM_SUBDIR: &str = "system";

/// Extended attribute marking a module directory as replacing its real counterpart.
pub const DEFAULT_OPAQUE_XATTR: &str = "trusted.overlay.opaque";

/// The value of [`DEFAULT_OPAQUE_XATTR`] that marks a directory opaque.
pub const OPAQUE_XATTR_VALUE: &[u8] = b"y";

/// Extended attribute holding the SELinux label of an entry.
pub const SELINUX_XATTR: &str = "security.selinux";

/// Source name given to the staging tmpfs.
pub const DEFAULT_TMPFS_SOURCE: &str = "APatch";

/// Candidate parents for the staging area, in order of preference.
pub const DEFAULT_TEMP_DIRS: &[&str] = &["/sbin", "/debug_ramdisk"];

/// Subdirectory of the temp dir used as the default work dir.
pub const WORK_SUBDIR: &str = "workdir";

/// Subdirectory of the work dir that the staging tmpfs is mounted on. Only this directory is
/// created and removed by a mount run; the rest of the work dir is left alone.
pub const STAGING_SUBDIR: &str = "overlay_tmp";

/// Partitions that may be promoted out of `/system`, with whether promotion additionally
/// requires `/system/<partition>` to be a symlink.
pub const DEFAULT_PARTITIONS: &[(&str, bool)] = &[
    ("vendor", true),
    ("system_ext", true),
    ("product", true),
    ("odm", false),
    ("oem", false),
];
