//! Utility functions and types.

mod mode;
mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use mode::*;
pub use term::*;
