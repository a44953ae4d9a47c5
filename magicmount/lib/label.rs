//! Security-context propagation.
//!
//! Every object materialized in the staging area has to carry the same mandatory-access-control
//! label as the entry it stands in for, otherwise the merged view would be distinguishable from
//! the real one. Labels are read and written without following a trailing symlink.

use std::{
    fmt::{self, Display},
    io,
    path::Path,
};

use crate::{
    config::{OPAQUE_XATTR_VALUE, SELINUX_XATTR},
    MountError, MountResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The raw value of an entry's security label, e.g. `u:object_r:system_file:s0`.
///
/// The bytes are kept exactly as stored by the kernel (including any trailing NUL), so a label
/// read from one entry and written to another reproduces the identical attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityLabel(Vec<u8>);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SecurityLabel {
    /// Creates a label from its raw attribute value.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    /// Returns the raw attribute value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the label carries no value.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads the security label of `path` without dereferencing a trailing symlink.
///
/// Unlabeled entries are common, so both a missing attribute and a read failure yield `None`.
pub fn get_label(path: impl AsRef<Path>) -> Option<SecurityLabel> {
    let path = path.as_ref();
    match read_xattr_label(path, SELINUX_XATTR) {
        Ok(label) => label,
        Err(e) => {
            tracing::debug!("cannot read label of {}: {}", path.display(), e);
            None
        }
    }
}

/// Writes `label` to `path` without following a trailing symlink.
///
/// Setting an empty label is a no-op.
pub fn set_label(path: impl AsRef<Path>, label: &SecurityLabel) -> MountResult<()> {
    write_xattr_label(path.as_ref(), SELINUX_XATTR, label)
}

/// Copies the label of `source` onto `target`, if `source` has one.
pub fn clone_label(source: impl AsRef<Path>, target: impl AsRef<Path>) -> MountResult<()> {
    match get_label(source) {
        Some(label) => set_label(target, &label),
        None => Ok(()),
    }
}

/// Returns `true` if the module directory at `path` carries the opaque marker attribute.
pub fn is_opaque_dir(path: impl AsRef<Path>, xattr_name: &str) -> bool {
    matches!(
        xattr::get(path.as_ref(), xattr_name),
        Ok(Some(value)) if value == OPAQUE_XATTR_VALUE
    )
}

pub(crate) fn read_xattr_label(path: &Path, name: &str) -> io::Result<Option<SecurityLabel>> {
    Ok(xattr::get(path, name)?
        .map(SecurityLabel::new)
        .filter(|label| !label.is_empty()))
}

pub(crate) fn write_xattr_label(path: &Path, name: &str, label: &SecurityLabel) -> MountResult<()> {
    if label.is_empty() {
        return Ok(());
    }

    xattr::set(path, name, label.as_bytes()).map_err(|e| MountError::Label {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::trace!("set label {} on {}", label, path.display());
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for SecurityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |pos| pos + 1);
        write!(f, "{}", String::from_utf8_lossy(&self.0[..end]))
    }
}

impl From<&str> for SecurityLabel {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
