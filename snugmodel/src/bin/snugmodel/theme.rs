use clap::builder::styling::{AnsiColor, Style};
use colored::Color;
use once_cell::sync::Lazy;

/// Colors used for messages, key parts and help text.
pub struct Palette {
    pub ok: Color,
    pub fail: Color,
    pub dim: Color,
    pub accent: Color,
    /// Kind names in key paths and schema tables.
    pub kind: Color,
    /// Identifiers and resource id tokens.
    pub token: Color,
}

pub static PALETTE: Lazy<Palette> = Lazy::new(|| Palette {
    ok: Color::Green,
    fail: Color::Red,
    dim: Color::BrightBlack,
    accent: Color::Cyan,
    kind: Color::BrightBlue,
    token: Color::Magenta,
});

/// Clap help styles matching [`PALETTE`].
pub fn help_styles() -> clap::builder::Styles {
    let ansi = |color: AnsiColor| Style::new().fg_color(Some(color.into()));
    clap::builder::Styles::styled()
        .usage(ansi(AnsiColor::BrightBlue).bold())
        .header(ansi(AnsiColor::Cyan).bold())
        .literal(ansi(AnsiColor::Magenta))
        .placeholder(ansi(AnsiColor::BrightBlack))
        .valid(ansi(AnsiColor::Green))
        .invalid(ansi(AnsiColor::Yellow))
        .error(ansi(AnsiColor::Red).bold())
}

pub const MARK_OK: &str = "✓";
pub const MARK_FAIL: &str = "✗";
pub const ARROW: &str = "→";
pub const BULLET: &str = "•";
