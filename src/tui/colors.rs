//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::{Priority, Status};

/// Accent for the focused field, column and status bar.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Background of the delete confirmation.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Tag color for labels.
pub const INDIGO: Color = Color::Rgb(99, 102, 241);

pub const SLATE: Color = Color::Rgb(148, 163, 184);
pub const BLUE: Color = Color::Rgb(59, 130, 246);
pub const ROSE: Color = Color::Rgb(244, 63, 94);
pub const EMERALD: Color = Color::Rgb(16, 185, 129);

pub fn status_color(status: Status) -> Color {
    match status {
        Status::Incomplete => SLATE,
        Status::InProgress => BLUE,
        Status::Due => ROSE,
        Status::Complete => EMERALD,
    }
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => SLATE,
        Priority::Medium => Color::Rgb(245, 158, 11),
        Priority::High => ROSE,
    }
}
