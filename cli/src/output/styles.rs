//! Terminal stylesheet.

use owo_colors::Style;

/// Styles for every kind of line `silo` prints. The default is plain text.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// `→` marker of service steps.
    pub step: Style,
    /// Verbose detail lines and key columns.
    pub dim: Style,
    /// "Ports:", "URLs:" and similar section titles.
    pub header: Style,
}

impl Styles {
    /// Switch from plain text to ANSI colors.
    pub fn colorize(&mut self) {
        *self = Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            info: Style::new().blue(),
            step: Style::new().cyan(),
            dim: Style::new().dimmed(),
            header: Style::new().bold().cyan(),
        };
    }
}
