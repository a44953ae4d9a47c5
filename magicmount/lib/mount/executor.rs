use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use crate::{
    config::MountConfig,
    tree::{Node, NodeKind},
    MountError, MountResult,
};

use super::{
    mirror::{self, apply_metadata, clone_symlink},
    Mounter,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Walks the merged module tree and realizes it on the real filesystem.
///
/// Nodes whose real directory can absorb them are bind-mounted in place. A directory that needs
/// to gain, lose or retype a child is instead rebuilt in the staging area, populated with the
/// module entries and mirrors of the untouched real entries, and then moved over the real
/// directory as a whole.
#[derive(Debug)]
pub struct MagicMount<'a, M: Mounter + ?Sized> {
    config: &'a MountConfig,
    mounter: &'a M,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a, M: Mounter + ?Sized> MagicMount<'a, M> {
    /// Creates an executor that mounts through `mounter`.
    pub fn new(config: &'a MountConfig, mounter: &'a M) -> Self {
        Self { config, mounter }
    }

    /// Mounts the tree rooted at `root` onto the configured root directory, using `staging_root`
    /// as the staging area.
    ///
    /// `staging_root` must already exist and be a private mount point.
    pub fn mount_tree(&self, root: Node, staging_root: &Path) -> MountResult<()> {
        self.mount_node(self.config.get_root_dir(), staging_root, root, false)
    }

    fn mount_node(
        &self,
        path: &Path,
        work_path: &Path,
        node: Node,
        has_staging: bool,
    ) -> MountResult<()> {
        match node.kind {
            NodeKind::RegularFile => self.mount_file(path, work_path, node, has_staging),
            NodeKind::Symlink => self.mount_symlink(work_path, node),
            NodeKind::Directory => self.mount_dir(path, work_path, node, has_staging),
            NodeKind::Whiteout => {
                tracing::debug!("file {} is removed", path.display());
                Ok(())
            }
        }
    }

    fn mount_file(
        &self,
        path: &Path,
        work_path: &Path,
        node: Node,
        has_staging: bool,
    ) -> MountResult<()> {
        let origin = node
            .origin
            .ok_or_else(|| MountError::MissingOrigin(path.to_path_buf()))?;

        let target = if has_staging {
            File::create(work_path).map_err(|e| MountError::fs("create file", work_path, e))?;
            work_path
        } else {
            path
        };

        self.mounter.bind_mount(&origin, target)?;
        tracing::debug!(
            "mount module file {} -> {}",
            origin.display(),
            target.display()
        );

        Ok(())
    }

    fn mount_symlink(&self, work_path: &Path, node: Node) -> MountResult<()> {
        let origin = node
            .origin
            .ok_or_else(|| MountError::MissingOrigin(work_path.to_path_buf()))?;

        clone_symlink(&origin, work_path)
    }

    fn mount_dir(
        &self,
        path: &Path,
        work_path: &Path,
        mut node: Node,
        has_staging: bool,
    ) -> MountResult<()> {
        if node.opaque && node.origin.is_none() {
            return Err(MountError::OpaqueWithoutOrigin(path.to_path_buf()));
        }

        let create_staging = !has_staging && (node.opaque || self.needs_staging(path, &mut node));
        let has_staging = has_staging || create_staging;

        if has_staging {
            self.prepare_staging_dir(path, work_path, &node)?;
        }

        if create_staging {
            tracing::debug!(
                "creating staging dir {} for {}",
                work_path.display(),
                path.display()
            );
            self.mounter.bind_mount(work_path, work_path)?;
        }

        if path.is_dir() && !node.opaque {
            let entries = fs::read_dir(path).map_err(|e| MountError::ReadDir {
                path: path.to_path_buf(),
                source: e,
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| MountError::ReadDir {
                    path: path.to_path_buf(),
                    source: e,
                })?;

                let name = entry.file_name();
                match node.take_child(&name) {
                    Some(child) if child.skip => {}
                    Some(child) => self.mount_child(path, work_path, child, has_staging)?,
                    None if has_staging => {
                        mirror::mirror(self.mounter, &path.join(&name), &work_path.join(&name))
                            .map_err(|e| MountError::child(path.join(&name), e))?;
                    }
                    None => {}
                }
            }
        }

        for child in std::mem::take(&mut node.children).into_values() {
            if child.skip {
                continue;
            }

            self.mount_child(path, work_path, child, has_staging)?;
        }

        if create_staging {
            tracing::debug!(
                "moving staging dir {} to {}",
                work_path.display(),
                path.display()
            );
            self.mounter.move_mount(work_path, path)?;
            self.mounter.make_private(path, true)?;
        }

        Ok(())
    }

    /// Mounts one child of a directory.
    ///
    /// Inside a staging tree any failure is fatal, since a half-populated staging directory must
    /// never be moved into place. Outside of one the failed branch is only logged.
    fn mount_child(
        &self,
        path: &Path,
        work_path: &Path,
        child: Node,
        has_staging: bool,
    ) -> MountResult<()> {
        let child_path = path.join(&child.name);
        let child_work_path = work_path.join(&child.name);

        match self.mount_node(&child_path, &child_work_path, child, has_staging) {
            Ok(()) => Ok(()),
            Err(e) if has_staging => Err(MountError::child(child_path, e)),
            Err(e) => {
                tracing::warn!("failed to mount {}: {}", child_path.display(), e);
                Ok(())
            }
        }
    }

    /// Returns `true` if the real directory at `path` cannot absorb `node`'s children through
    /// bind mounts alone.
    ///
    /// A directory without a module source cannot be staged, so children that would need it are
    /// marked as skipped instead.
    fn needs_staging(&self, path: &Path, node: &mut Node) -> bool {
        let has_origin = node.origin.is_some();

        for (name, child) in node.children.iter_mut() {
            let real_path = path.join(name);
            let needs = match child.kind {
                NodeKind::Symlink => true,
                NodeKind::Whiteout => fs::symlink_metadata(&real_path).is_ok(),
                kind => NodeKind::of_path(&real_path) != Some(kind),
            };

            if !needs {
                continue;
            }

            if !has_origin {
                tracing::warn!(
                    "cannot create staging for {}, ignoring {}",
                    path.display(),
                    real_path.display()
                );
                child.mark_skip();
                continue;
            }

            return true;
        }

        false
    }

    /// Creates the staging directory for `path` with the owner, mode and label of the real
    /// directory, or of the module directory when there is no real one.
    fn prepare_staging_dir(&self, path: &Path, work_path: &Path, node: &Node) -> MountResult<()> {
        let (metadata, source) = staging_metadata_source(path, node)?;

        fs::create_dir_all(work_path).map_err(|e| MountError::fs("create dir", work_path, e))?;
        apply_metadata(work_path, &metadata, &source)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Picks the directory whose attributes a staging directory for `path` copies.
///
/// Symlinks are resolved first, so the returned metadata and the returned path (from which the
/// label is read) always describe the same directory.
fn staging_metadata_source(path: &Path, node: &Node) -> MountResult<(fs::Metadata, PathBuf)> {
    resolve_dir(path)
        .or_else(|| node.origin.as_deref().and_then(resolve_dir))
        .ok_or_else(|| MountError::NoMetadataSource(path.to_path_buf()))
}

fn resolve_dir(path: &Path) -> Option<(fs::Metadata, PathBuf)> {
    let resolved = fs::canonicalize(path).ok()?;
    let metadata = fs::symlink_metadata(&resolved).ok()?;
    metadata.is_dir().then_some((metadata, resolved))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
