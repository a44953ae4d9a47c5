use std::{fs, path::Path};

use crate::{config::MountConfig, tree::TreeBuilder, MountError, MountResult};

use super::{KernelMounter, MagicMount, Mounter};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Merges all enabled modules and mounts the result onto the real filesystem.
///
/// This is the single entry point run once at boot, before anything reads `/system`.
pub fn compose_and_mount(config: &MountConfig) -> MountResult<()> {
    compose_and_mount_with(config, &KernelMounter)
}

/// Like [`compose_and_mount`], but performs every mount through `mounter`.
///
/// A private tmpfs is mounted on a dedicated child of the work dir for the duration of the run.
/// It is lazily unmounted and that child removed afterwards whether or not mounting succeeded;
/// staging directories that were already moved into place stay mounted. Nothing else in the
/// work dir is touched.
///
/// Returns `Ok(())` without touching the work dir if no module contributes anything.
pub fn compose_and_mount_with<M: Mounter + ?Sized>(
    config: &MountConfig,
    mounter: &M,
) -> MountResult<()> {
    let Some(root) = TreeBuilder::new(config).build()? else {
        return Ok(());
    };

    let staging_dir = config.resolve_staging_dir()?;
    tracing::info!("using staging area {}", staging_dir.display());

    fs::create_dir_all(&staging_dir).map_err(|e| MountError::fs("create dir", &staging_dir, e))?;
    if let Err(e) = mounter.mount_tmpfs(config.get_tmpfs_source(), &staging_dir) {
        remove_staging_dir(&staging_dir);
        return Err(e);
    }

    let result = mounter
        .make_private(&staging_dir, false)
        .and_then(|_| MagicMount::new(config, mounter).mount_tree(root, &staging_dir));

    if let Err(e) = mounter.unmount_detach(&staging_dir) {
        tracing::error!(
            "failed to unmount staging area {}: {}",
            staging_dir.display(),
            e
        );
    }
    remove_staging_dir(&staging_dir);

    match &result {
        Ok(()) => tracing::info!("magic mount finished"),
        Err(e) => tracing::error!("magic mount failed: {}", e),
    }

    result
}

fn remove_staging_dir(staging_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(staging_dir) {
        tracing::error!(
            "failed to remove staging area {}: {}",
            staging_dir.display(),
            e
        );
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
