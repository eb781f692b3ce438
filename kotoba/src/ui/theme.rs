//! Color theme and styling for the chat TUI

use ratatui::style::{Color, Modifier, Style};

/// UI color theme
#[derive(Debug, Clone)]
pub struct AppTheme {
    // Base colors
    pub foreground: Color,
    pub border: Color,
    pub border_focused: Color,

    // Text colors
    pub user_text: Color,
    pub ai_text: Color,
    pub gloss_text: Color,
    pub system_text: Color,

    // Correction colors
    pub correction_ok: Color,
    pub correction_fix: Color,
}

impl Default for AppTheme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,

            user_text: Color::Cyan,
            ai_text: Color::White,
            gloss_text: Color::Yellow,
            system_text: Color::DarkGray,

            correction_ok: Color::Green,
            correction_fix: Color::LightRed,
        }
    }
}

impl AppTheme {
    /// Get style for user messages
    pub fn user_style(&self) -> Style {
        Style::default().fg(self.user_text)
    }

    /// Get style for AI messages
    pub fn ai_style(&self) -> Style {
        Style::default().fg(self.ai_text)
    }

    /// Get style for annotated vocabulary words
    pub fn gloss_style(&self) -> Style {
        Style::default()
            .fg(self.gloss_text)
            .add_modifier(Modifier::UNDERLINED)
    }

    /// Get style for system messages
    pub fn system_style(&self) -> Style {
        Style::default()
            .fg(self.system_text)
            .add_modifier(Modifier::DIM)
    }

    /// Get style for a correction marker
    pub fn correction_style(&self, is_correct: bool) -> Style {
        Style::default().fg(if is_correct {
            self.correction_ok
        } else {
            self.correction_fix
        })
    }

    /// Get border style
    pub fn border_style(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }
}
