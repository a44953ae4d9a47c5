//! Realization of the merged module tree through mounts.

mod compose;
mod executor;
mod mirror;
mod mounter;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use compose::*;
pub use executor::*;
pub use mirror::mirror;
pub use mounter::*;
