//! Spinners for waits with no output of their own, such as stopping Tilt.

#![allow(clippy::expect_used)] // Templates are compile-time constants

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];

/// Start a spinner showing `msg`.
#[must_use]
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(TICKS)
            .template("  {spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, mark: &'static str, msg: &str) {
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {prefix} {msg}")
            .expect("valid template"),
    );
    pb.set_prefix(mark);
    pb.finish_with_message(msg.to_string());
}

/// Replace the spinner with `✓ msg`.
pub fn finish_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, "✓", msg);
}

/// Replace the spinner with `✗ msg`.
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    finish(pb, "✗", msg);
}
