use std::{
    cell::RefCell,
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use nix::mount::{mount, umount2, MntFlags, MsFlags};

use crate::{MountError, MountResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const TMPFS: &str = "tmpfs";

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The mount operations the executor needs from the kernel.
///
/// All calls act on the mount namespace of the calling process.
pub trait Mounter {
    /// Mounts a fresh tmpfs named `source` on `target`.
    fn mount_tmpfs(&self, source: &str, target: &Path) -> MountResult<()>;

    /// Bind-mounts `from` onto `to`.
    fn bind_mount(&self, from: &Path, to: &Path) -> MountResult<()>;

    /// Moves the mount at `from` (with everything mounted below it) to `to`.
    fn move_mount(&self, from: &Path, to: &Path) -> MountResult<()>;

    /// Sets the propagation of the mount at `target` to private.
    fn make_private(&self, target: &Path, recursive: bool) -> MountResult<()>;

    /// Lazily unmounts `target`.
    fn unmount_detach(&self, target: &Path) -> MountResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Performs mount operations with the real mount system calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelMounter;

/// Records mount operations instead of performing them.
///
/// Used by `magicmount mount --dry-run` to show what would be mounted, and by tests to assert
/// on the executor's decisions without privileges.
#[derive(Debug, Default)]
pub struct DryRunMounter {
    ops: RefCell<Vec<MountOp>>,
}

/// A mount operation recorded by [`DryRunMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOp {
    /// A tmpfs mounted on `target`.
    Tmpfs {
        /// The tmpfs source name.
        source: String,

        /// The mount point.
        target: PathBuf,
    },

    /// A bind mount of `from` onto `to`.
    Bind {
        /// The bind source.
        from: PathBuf,

        /// The mount point.
        to: PathBuf,
    },

    /// A move of the mount at `from` to `to`.
    Move {
        /// The mount being moved.
        from: PathBuf,

        /// The new mount point.
        to: PathBuf,
    },

    /// A propagation change to private.
    Private {
        /// The mount point.
        target: PathBuf,

        /// Whether the change applies to every mount below `target` too.
        recursive: bool,
    },

    /// A lazy unmount.
    Unmount {
        /// The mount point.
        target: PathBuf,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DryRunMounter {
    /// Creates a mounter with no recorded operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the operations recorded so far, in order.
    pub fn ops(&self) -> Vec<MountOp> {
        self.ops.borrow().clone()
    }

    fn record(&self, op: MountOp) -> MountResult<()> {
        tracing::info!("[dry-run] {}", op);
        self.ops.borrow_mut().push(op);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Mounter for KernelMounter {
    fn mount_tmpfs(&self, source: &str, target: &Path) -> MountResult<()> {
        mount(Some(source), target, Some(TMPFS), MsFlags::empty(), None::<&str>).map_err(
            |errno| MountError::Mount {
                op: "mount tmpfs",
                from: PathBuf::from(source),
                to: target.to_path_buf(),
                errno,
            },
        )
    }

    fn bind_mount(&self, from: &Path, to: &Path) -> MountResult<()> {
        mount(Some(from), to, None::<&str>, MsFlags::MS_BIND, None::<&str>).map_err(|errno| {
            MountError::Mount {
                op: "bind mount",
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                errno,
            }
        })
    }

    fn move_mount(&self, from: &Path, to: &Path) -> MountResult<()> {
        mount(Some(from), to, None::<&str>, MsFlags::MS_MOVE, None::<&str>).map_err(|errno| {
            MountError::Mount {
                op: "move mount",
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                errno,
            }
        })
    }

    fn make_private(&self, target: &Path, recursive: bool) -> MountResult<()> {
        let mut flags = MsFlags::MS_PRIVATE;
        if recursive {
            flags |= MsFlags::MS_REC;
        }

        mount(None::<&str>, target, None::<&str>, flags, None::<&str>).map_err(|errno| {
            MountError::Mount {
                op: "make private",
                from: target.to_path_buf(),
                to: target.to_path_buf(),
                errno,
            }
        })
    }

    fn unmount_detach(&self, target: &Path) -> MountResult<()> {
        umount2(target, MntFlags::MNT_DETACH).map_err(|errno| MountError::Mount {
            op: "unmount",
            from: target.to_path_buf(),
            to: target.to_path_buf(),
            errno,
        })
    }
}

impl Mounter for DryRunMounter {
    fn mount_tmpfs(&self, source: &str, target: &Path) -> MountResult<()> {
        self.record(MountOp::Tmpfs {
            source: source.to_string(),
            target: target.to_path_buf(),
        })
    }

    fn bind_mount(&self, from: &Path, to: &Path) -> MountResult<()> {
        self.record(MountOp::Bind {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        })
    }

    fn move_mount(&self, from: &Path, to: &Path) -> MountResult<()> {
        self.record(MountOp::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        })
    }

    fn make_private(&self, target: &Path, recursive: bool) -> MountResult<()> {
        self.record(MountOp::Private {
            target: target.to_path_buf(),
            recursive,
        })
    }

    fn unmount_detach(&self, target: &Path) -> MountResult<()> {
        self.record(MountOp::Unmount {
            target: target.to_path_buf(),
        })
    }
}

impl Display for MountOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountOp::Tmpfs { source, target } => {
                write!(f, "mount tmpfs {} on {}", source, target.display())
            }
            MountOp::Bind { from, to } => {
                write!(f, "bind mount {} -> {}", from.display(), to.display())
            }
            MountOp::Move { from, to } => {
                write!(f, "move mount {} -> {}", from.display(), to.display())
            }
            MountOp::Private { target, recursive } => write!(
                f,
                "make {}private {}",
                if *recursive { "recursively " } else { "" },
                target.display()
            ),
            MountOp::Unmount { target } => write!(f, "unmount {}", target.display()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
