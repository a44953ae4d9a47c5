//! Configuration of the module tree and the device layout it is mounted onto.

mod defaults;
mod mount_config;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use mount_config::*;
