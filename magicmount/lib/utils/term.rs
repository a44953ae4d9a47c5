use std::{
    env,
    io::{self, IsTerminal},
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns `true` if stdout is an interactive terminal that understands ANSI escapes.
pub fn is_ansi_interactive_terminal() -> bool {
    io::stdout().is_terminal() && env::var("TERM").map_or(true, |term| term != "dumb")
}
