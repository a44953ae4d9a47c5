//! The virtual tree: an in-memory merge of every enabled module's `system` subtree.

mod builder;
mod node;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use builder::*;
pub use node::*;
