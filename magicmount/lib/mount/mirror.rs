//! Replication of untouched real entries into a staging directory.

use std::{
    fs::{self, File, Metadata},
    io,
    os::unix::fs::{symlink, MetadataExt, PermissionsExt},
    path::Path,
};

use nix::unistd::{chown, Gid, Uid};

use crate::{label, utils, MountError, MountResult};

use super::Mounter;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PERMISSION_BITS: u32 = 0o7777;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reproduces the real entry at `real_path` at `work_path` inside the staging area.
///
/// Files and other non-directories are bind-mounted from the real entry, symlinks are recreated
/// and directories are recreated with the real owner, mode and label before their contents are
/// mirrored recursively. An entry that disappears before it can be inspected is skipped.
///
/// ## Errors
/// Returns [`MountError::MirrorCycle`] if a directory is reached again below itself, e.g. through
/// a bind mount of one of its ancestors.
pub fn mirror<M: Mounter + ?Sized>(
    mounter: &M,
    real_path: &Path,
    work_path: &Path,
) -> MountResult<()> {
    let mut ancestors = Vec::new();
    mirror_entry(mounter, real_path, work_path, &mut ancestors)
}

fn mirror_entry<M: Mounter + ?Sized>(
    mounter: &M,
    real_path: &Path,
    work_path: &Path,
    ancestors: &mut Vec<(u64, u64)>,
) -> MountResult<()> {
    let metadata = match fs::symlink_metadata(real_path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} vanished before mirroring, skipping", real_path.display());
            return Ok(());
        }
        Err(e) => return Err(MountError::fs("stat", real_path, e)),
    };

    let file_type = metadata.file_type();
    if file_type.is_dir() {
        let id = (metadata.dev(), metadata.ino());
        if ancestors.contains(&id) {
            return Err(MountError::MirrorCycle(real_path.to_path_buf()));
        }

        fs::create_dir(work_path).map_err(|e| MountError::fs("create dir", work_path, e))?;
        apply_metadata(work_path, &metadata, real_path)?;

        ancestors.push(id);
        let entries = fs::read_dir(real_path).map_err(|e| MountError::ReadDir {
            path: real_path.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| MountError::ReadDir {
                path: real_path.to_path_buf(),
                source: e,
            })?;

            let name = entry.file_name();
            mirror_entry(
                mounter,
                &real_path.join(&name),
                &work_path.join(&name),
                ancestors,
            )?;
        }
        ancestors.pop();
    } else if file_type.is_symlink() {
        clone_symlink(real_path, work_path)?;
    } else {
        File::create(work_path).map_err(|e| MountError::fs("create file", work_path, e))?;
        mounter.bind_mount(real_path, work_path)?;
    }

    Ok(())
}

/// Gives `target` the owner and permission bits of `metadata` and the label of `label_source`.
///
/// Ownership is applied first, since changing the owner clears set-id bits.
pub(crate) fn apply_metadata(
    target: &Path,
    metadata: &Metadata,
    label_source: &Path,
) -> MountResult<()> {
    chown(
        target,
        Some(Uid::from_raw(metadata.uid())),
        Some(Gid::from_raw(metadata.gid())),
    )
    .map_err(|errno| MountError::fs("chown", target, errno.into()))?;

    let mode = metadata.mode() & PERMISSION_BITS;
    fs::set_permissions(target, fs::Permissions::from_mode(mode))
        .map_err(|e| MountError::fs("chmod", target, e))?;

    label::clone_label(label_source, target)?;

    tracing::trace!(
        "applied {}:{} {} to {}",
        metadata.uid(),
        metadata.gid(),
        utils::format_mode(mode),
        target.display()
    );

    Ok(())
}

/// Recreates the symlink at `source` at `target` with the same link text and label.
pub(crate) fn clone_symlink(source: &Path, target: &Path) -> MountResult<()> {
    let link = fs::read_link(source).map_err(|e| MountError::fs("read link", source, e))?;
    symlink(&link, target).map_err(|e| MountError::fs("symlink", target, e))?;
    label::clone_label(source, target)?;

    tracing::debug!(
        "clone symlink {} -> {} ({})",
        source.display(),
        target.display(),
        link.display()
    );

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
