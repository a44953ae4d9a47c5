use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    fmt::Write,
    fs,
    os::unix::fs::{FileTypeExt, MetadataExt},
    path::{Path, PathBuf},
};

use getset::{CopyGetters, Getters};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a node of the virtual tree stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A regular file, or any other non-directory that can be bind-mounted.
    RegularFile,

    /// A directory whose children are merged or replaced.
    Directory,

    /// A symlink, which can only be recreated, never bind-mounted.
    Symlink,

    /// A logical deletion of the real entry with the same name.
    Whiteout,
}

/// A node of the merged module tree.
///
/// Directories exclusively own their children. The tree is built once, consumed once by the
/// mount executor and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Node {
    /// The path segment this node represents.
    #[getset(get = "pub with_prefix")]
    pub(crate) name: OsString,

    /// The kind of entry.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) kind: NodeKind,

    /// Children by name. Only directories have children.
    #[getset(get = "pub with_prefix")]
    pub(crate) children: BTreeMap<OsString, Node>,

    /// The module-owned source of this entry. `None` for synthetic nodes.
    #[getset(get = "pub with_prefix")]
    pub(crate) origin: Option<PathBuf>,

    /// Whether this directory replaces its real counterpart instead of merging with it.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) opaque: bool,

    /// Whether the executor ignores this node and everything below it.
    #[getset(get_copy = "pub with_prefix")]
    pub(crate) skip: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NodeKind {
    /// Classifies an entry from its `lstat` metadata.
    ///
    /// A character device with device number 0 is the overlay convention for a whiteout.
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            NodeKind::Directory
        } else if file_type.is_symlink() {
            NodeKind::Symlink
        } else if file_type.is_char_device() && metadata.rdev() == 0 {
            NodeKind::Whiteout
        } else {
            NodeKind::RegularFile
        }
    }

    /// Classifies the entry at `path` without following a trailing symlink.
    ///
    /// Returns `None` if nothing exists at `path`.
    pub fn of_path(path: impl AsRef<Path>) -> Option<Self> {
        fs::symlink_metadata(path)
            .ok()
            .map(|metadata| Self::from_metadata(&metadata))
    }
}

impl Node {
    /// Creates a node of any kind.
    pub fn new(name: impl Into<OsString>, kind: NodeKind, origin: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            children: BTreeMap::new(),
            origin,
            opaque: false,
            skip: false,
        }
    }

    /// Creates a synthetic directory that only hosts children.
    pub fn new_root(name: impl Into<OsString>) -> Self {
        Self::new(name, NodeKind::Directory, None)
    }

    /// Creates a node for the module entry at `path`, reading the opaque marker of directories
    /// from `opaque_xattr`.
    pub fn new_module(
        name: impl Into<OsString>,
        path: impl Into<PathBuf>,
        metadata: &fs::Metadata,
        opaque_xattr: &str,
    ) -> Self {
        let path = path.into();
        let kind = NodeKind::from_metadata(metadata);
        let opaque =
            kind == NodeKind::Directory && crate::label::is_opaque_dir(&path, opaque_xattr);

        Self::new(name, kind, Some(path)).with_opaque(opaque)
    }

    /// Sets the opaque flag.
    pub fn with_opaque(mut self, opaque: bool) -> Self {
        self.opaque = opaque;
        self
    }

    /// Adds a child, replacing any previous child with the same name.
    pub fn with_child(mut self, child: Node) -> Self {
        self.insert_child(child);
        self
    }

    /// Adds a child, returning the child it replaced.
    pub fn insert_child(&mut self, child: Node) -> Option<Node> {
        self.children.insert(child.name.clone(), child)
    }

    /// Removes and returns the child called `name`.
    pub fn take_child(&mut self, name: impl AsRef<OsStr>) -> Option<Node> {
        self.children.remove(name.as_ref())
    }

    /// Returns the child called `name`.
    pub fn child(&self, name: impl AsRef<OsStr>) -> Option<&Node> {
        self.children.get(name.as_ref())
    }

    /// Returns `true` if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Marks the node so that the executor leaves it and its descendants alone.
    pub fn mark_skip(&mut self) {
        self.skip = true;
    }

    /// Returns the paths, relative to this node, of every node without children.
    pub fn leaf_paths(&self) -> Vec<PathBuf> {
        let mut leaves = Vec::new();
        for child in self.children.values() {
            child.collect_leaves(PathBuf::new(), &mut leaves);
        }
        leaves
    }

    fn collect_leaves(&self, parent: PathBuf, leaves: &mut Vec<PathBuf>) {
        let path = parent.join(&self.name);
        if self.children.is_empty() {
            leaves.push(path);
            return;
        }

        for child in self.children.values() {
            child.collect_leaves(path.clone(), leaves);
        }
    }

    /// Renders the tree as an indented listing, one node per line.
    ///
    /// ```text
    /// /
    ///   system/
    ///     bin/ <- /data/adb/modules/a/system/bin
    ///       tool <- /data/adb/modules/a/system/bin/tool
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        let name = if self.name.is_empty() {
            "/".into()
        } else {
            self.name.to_string_lossy()
        };

        let marker = match self.kind {
            NodeKind::Directory if !self.name.is_empty() => "/",
            NodeKind::Symlink => "@",
            NodeKind::Whiteout => " (whiteout)",
            _ => "",
        };

        let _ = write!(out, "{:indent$}{}{}", "", name, marker, indent = depth * 2);
        if self.opaque {
            out.push_str(" [opaque]");
        }
        if self.skip {
            out.push_str(" [skip]");
        }
        if let Some(origin) = &self.origin {
            let _ = write!(out, " <- {}", origin.display());
        }
        out.push('\n');

        for child in self.children.values() {
            child.render_into(depth + 1, out);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
