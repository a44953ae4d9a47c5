use std::{collections::btree_map::Entry, fs, path::Path};

use crate::{
    config::MountConfig,
    modules::{self, Module},
    MountError, MountResult,
};

use super::{Node, NodeKind};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Merges the `system` subtrees of all enabled modules into one virtual tree.
///
/// ## Example
/// ```no_run
/// use magicmount::{config::MountConfig, tree::TreeBuilder};
///
/// # fn example() -> magicmount::MountResult<()> {
/// let config = MountConfig::default();
/// if let Some(root) = TreeBuilder::new(&config).build()? {
///     print!("{}", root.render());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    config: &'a MountConfig,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> TreeBuilder<'a> {
    /// Creates a builder for the given configuration.
    pub fn new(config: &'a MountConfig) -> Self {
        Self { config }
    }

    /// Enumerates the modules under the configured module root and merges them.
    ///
    /// Returns `None` if no enabled module contributes anything to mount.
    pub fn build(&self) -> MountResult<Option<Node>> {
        let modules = modules::enumerate_modules(self.config)?;
        self.build_from(&modules)
    }

    /// Merges the given modules, in order, into one tree.
    ///
    /// The result is a synthetic root holding a `system` child and any promoted partitions.
    pub fn build_from(&self, modules: &[Module]) -> MountResult<Option<Node>> {
        let mut system = Node::new_root(self.config.get_system_subdir());
        let mut has_file = false;

        for module in modules {
            let Some(system_dir) = module.get_system_dir() else {
                continue;
            };

            if !module.is_mountable() {
                tracing::debug!(
                    "module {} is disabled or skips mount, ignoring",
                    module.get_name().to_string_lossy()
                );
                continue;
            }

            tracing::debug!("collecting files of module {}", module.get_root().display());
            has_file |= self.merge_dir(&mut system, system_dir)?;
        }

        if !has_file {
            tracing::info!("no modules to mount");
            return Ok(None);
        }

        let mut root = Node::new_root("");
        self.promote_partitions(&mut root, &mut system);
        root.insert_child(system);

        Ok(Some(root))
    }

    /// Merges the module directory `module_dir` into `node`.
    ///
    /// Returns `true` if the directory contributes any file, or any opaque directory.
    fn merge_dir(&self, node: &mut Node, module_dir: &Path) -> MountResult<bool> {
        let mut has_file = false;
        let entries = fs::read_dir(module_dir).map_err(|e| MountError::ReadDir {
            path: module_dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| MountError::ReadDir {
                path: module_dir.to_path_buf(),
                source: e,
            })?;

            let name = entry.file_name();
            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("cannot stat module entry {}: {}", path.display(), e);
                    continue;
                }
            };

            let kind = NodeKind::from_metadata(&metadata);
            match node.children.entry(name) {
                Entry::Vacant(slot) => {
                    let name = slot.key().clone();
                    let child = slot.insert(Node::new_module(
                        name,
                        &path,
                        &metadata,
                        self.config.get_opaque_xattr(),
                    ));

                    if child.is_dir() {
                        has_file |= self.merge_dir(child, &path)? || child.opaque;
                    } else {
                        has_file = true;
                    }
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    if existing.is_dir() && kind == NodeKind::Directory {
                        // The first module keeps the directory's origin and opaque flag.
                        has_file |= self.merge_dir(existing, &path)? || existing.opaque;
                    } else {
                        tracing::debug!(
                            "{} conflicts with an entry of an earlier module, ignoring",
                            path.display()
                        );
                    }
                }
            }
        }

        Ok(has_file)
    }

    /// Moves partition subtrees out of `system` to the top level where the device layout
    /// requires mounting them at their own path.
    fn promote_partitions(&self, root: &mut Node, system: &mut Node) {
        let system_subdir = self.config.get_system_subdir();

        for partition in self.config.get_partitions() {
            let name = partition.get_name();
            if !self.config.real_path(name).is_dir() {
                continue;
            }

            if *partition.get_require_symlink() {
                let path_of_system = self.config.real_path(system_subdir).join(name);
                let is_symlink = fs::symlink_metadata(&path_of_system)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_symlink {
                    continue;
                }
            }

            if let Some(node) = system.take_child(name) {
                tracing::debug!("promoting partition {} to the top level", name);
                root.insert_child(node);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
