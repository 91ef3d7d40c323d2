//! Named styles for terminal output.
//!
//! Rendering code asks for a style by what the text *is* (an address, a
//! time, a mismatch), never by color. Colors are dropped automatically when
//! stdout is not a terminal.

use console::Style;

pub fn address() -> Style {
    Style::new().bold()
}

pub fn muted() -> Style {
    Style::new().color256(246)
}

pub fn time() -> Style {
    Style::new().color256(246).italic()
}

pub fn title() -> Style {
    Style::new().bold()
}

pub fn tag() -> Style {
    Style::new().cyan()
}

pub fn matched() -> Style {
    Style::new().green()
}

pub fn mismatch() -> Style {
    Style::new().red()
}

pub fn success() -> Style {
    Style::new().green()
}

pub fn warning() -> Style {
    Style::new().yellow()
}

pub fn error() -> Style {
    Style::new().red().bold()
}
