use std::{io, path::PathBuf};

use nix::errno::Errno;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a magicmount-related operation.
pub type MountResult<T> = Result<T, MountError>;

/// An error that occurred while composing or mounting the module tree.
#[derive(pretty_error_debug::Debug, Error)]
pub enum MountError {
    /// A directory that has to be enumerated could not be read.
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        /// The directory that could not be read.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A filesystem operation on a staging or real entry failed.
    #[error("{op} {path} failed: {source}")]
    Fs {
        /// The operation that failed, e.g. `chmod`.
        op: &'static str,

        /// The path the operation was applied to.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A security label could not be written.
    #[error("failed to set security label on {path}: {source}")]
    Label {
        /// The path whose label could not be written.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A mount system call failed.
    #[error("{op} {from} -> {to} failed: {errno}")]
    Mount {
        /// The mount operation, e.g. `bind mount`.
        op: &'static str,

        /// The mount source.
        from: PathBuf,

        /// The mount target.
        to: PathBuf,

        /// The errno returned by the kernel.
        #[source]
        errno: Errno,
    },

    /// A file or symlink node reached the executor without a module source.
    #[error("cannot mount {0}: module path is missing")]
    MissingOrigin(PathBuf),

    /// An opaque directory node has no module source to build its replacement from.
    #[error("dir {0} is declared as replaced but has no module source")]
    OpaqueWithoutOrigin(PathBuf),

    /// Neither the real directory nor its module source can provide staging metadata.
    #[error("cannot get metadata for dir {0}")]
    NoMetadataSource(PathBuf),

    /// No staging area is configured and none of the default locations exist.
    #[error("no staging area available, tried: {0:?}")]
    NoStagingArea(Vec<PathBuf>),

    /// Mirroring re-entered a directory that is already on the mirror path.
    #[error("mirror cycle detected at {0}")]
    MirrorCycle(PathBuf),

    /// A child of a staged directory failed, which aborts the whole staging tree.
    #[error("magic mount {path} failed: {source}")]
    Child {
        /// The logical path of the child that failed.
        path: PathBuf,

        /// The child's error.
        #[source]
        source: Box<MountError>,
    },

    /// The configuration file could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MountError {
    /// Wraps an I/O error with the operation and path it came from.
    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> MountError {
        MountError::Fs {
            op,
            path: path.into(),
            source,
        }
    }

    /// Wraps a failed child of a staged directory.
    pub fn child(path: impl Into<PathBuf>, source: MountError) -> MountError {
        MountError::Child {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
