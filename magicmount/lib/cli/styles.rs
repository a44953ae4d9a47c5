use std::{fmt::Write, sync::LazyLock};

use clap::builder::styling::{AnsiColor, Effects, Style, Styles};

use crate::utils;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Whether stdout is an ANSI-capable interactive terminal.
static IS_ANSI_TERMINAL: LazyLock<bool> = LazyLock::new(utils::is_ansi_interactive_terminal);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A trait for applying the styles defined in [`styles`] to text.
pub trait AnsiStyles {
    /// Apply header style to text
    fn header(&self) -> String;

    /// Apply placeholder style to text
    fn placeholder(&self) -> String;

    /// Apply error style to text
    fn error(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns a `Styles` object with the default styles for the CLI.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

fn apply_style(text: &str, style: &Style, ansi: bool) -> String {
    if !ansi {
        return text.to_string();
    }

    let mut styled = String::with_capacity(text.len() + 16);
    let _ = write!(styled, "{}{}{}", style, text, style.render_reset());
    styled
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl AnsiStyles for str {
    fn header(&self) -> String {
        apply_style(self, styles().get_header(), *IS_ANSI_TERMINAL)
    }

    fn placeholder(&self) -> String {
        apply_style(self, styles().get_placeholder(), *IS_ANSI_TERMINAL)
    }

    fn error(&self) -> String {
        apply_style(self, styles().get_error(), *IS_ANSI_TERMINAL)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
