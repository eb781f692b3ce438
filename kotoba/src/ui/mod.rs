//! UI rendering for the chat TUI

pub mod render;
pub mod theme;

use ratatui::layout::Rect;

/// Overlay types
#[derive(Debug, Clone)]
pub enum Overlay {
    Help,
    /// Correction detail for the displayed message at this index
    Correction(usize),
    /// Vocabulary glosses for the displayed message at this index
    Vocab(usize),
    ConfirmDelete {
        id: String,
        name: String,
    },
    /// Credential entry, raised at startup when no key is stored
    ApiKey,
    Error(String),
}

/// A centered popup of fixed size, clamped to the available area.
pub fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
