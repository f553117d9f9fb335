//! Presentation extensions for core types, plus small layout helpers.
//!
//! Core stays free of ratatui; the mapping from domain states to colors and
//! labels lives here as extension traits.

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use volcano_pilot_core::download::DownloadPhase;
use volcano_pilot_core::errors::ErrorCategory;
use volcano_pilot_core::transcript::LineKind;

pub trait DownloadPhaseExt {
    fn color(&self) -> Color;
    fn label(&self) -> &str;
}

impl DownloadPhaseExt for DownloadPhase {
    fn color(&self) -> Color {
        match self {
            DownloadPhase::Idle => Color::DarkGray,
            DownloadPhase::Preparing => Color::Yellow,
            DownloadPhase::Ready => Color::Cyan,
            DownloadPhase::Downloading => Color::Blue,
            DownloadPhase::Completed => Color::Green,
            DownloadPhase::Error(_) => Color::Red,
        }
    }

    fn label(&self) -> &str {
        match self {
            DownloadPhase::Idle => "idle",
            DownloadPhase::Preparing => "scanning folder",
            DownloadPhase::Ready => "ready",
            DownloadPhase::Downloading => "downloading",
            DownloadPhase::Completed => "completed",
            DownloadPhase::Error(_) => "failed",
        }
    }
}

pub trait LineKindExt {
    fn style(&self) -> Style;
}

impl LineKindExt for LineKind {
    fn style(&self) -> Style {
        match self {
            LineKind::Command => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            LineKind::Output => Style::default(),
            LineKind::Error => Style::default().fg(Color::Red),
            LineKind::Info => Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        }
    }
}

pub trait ErrorCategoryExt {
    fn color(&self) -> Color;
}

impl ErrorCategoryExt for ErrorCategory {
    fn color(&self) -> Color {
        match self {
            ErrorCategory::Network => Color::Red,
            ErrorCategory::Backend => Color::Yellow,
            ErrorCategory::Config => Color::Magenta,
            ErrorCategory::Timeout => Color::Red,
            ErrorCategory::Other => Color::Red,
        }
    }
}

/// A rect of the given size centered in `area`, for confirmation popups.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [horizontal] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [centered] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(horizontal);
    centered
}

/// Footer line of `[key] action` hints.
pub fn key_hints(pairs: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(pairs.len() * 2);
    for (key, action) in pairs {
        spans.push(Span::styled(
            format!("[{key}]"),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {action}  ")));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_colors_distinguish_outcomes() {
        assert_eq!(DownloadPhase::Completed.color(), Color::Green);
        assert_eq!(
            DownloadPhase::Error("boom".to_string()).color(),
            Color::Red
        );
        assert_eq!(DownloadPhase::Downloading.label(), "downloading");
    }

    #[test]
    fn transcript_commands_stand_out() {
        let style = LineKind::Command.style();
        assert_eq!(style.fg, Some(Color::Cyan));
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(LineKind::Output.style(), Style::default());
    }

    #[test]
    fn centered_rect_fits_inside_the_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(40, 7, area);
        assert_eq!(popup.width, 40);
        assert_eq!(popup.height, 7);
        assert!(popup.x >= area.x && popup.right() <= area.right());
        assert!(popup.y >= area.y && popup.bottom() <= area.bottom());
    }

    #[test]
    fn key_hints_pair_keys_with_labels() {
        let line = key_hints(&[("r", "refresh"), ("q", "back")]);
        assert_eq!(line.spans.len(), 4);
        assert_eq!(line.spans[0].content, "[r]");
    }
}
