//! Event handling for the chat TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use kotoba_core::model::Sender;

use crate::app::{App, InputMode, PendingAction, Screen};
use crate::ui::Overlay;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) => handle_key_event(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

/// Handle a mouse event
fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> EventResult {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scroll_up(3);
            EventResult::NeedsRedraw
        }
        MouseEventKind::ScrollDown => {
            app.scroll_down(3);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle a key event
fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    // Overlays swallow keys until dismissed
    if app.has_overlay() {
        return handle_overlay_key(app, key);
    }

    // Global shortcuts (always work)
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Insert => handle_insert_mode(app, key),
        InputMode::Command => handle_command_mode(app, key),
    }
}

/// Handle keys in NORMAL mode (vim-style navigation and hotkeys)
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Char('i') | KeyCode::Char('a') => {
            app.enter_insert_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(':') => {
            app.enter_command_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('?') | KeyCode::F(1) => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }
        _ => match app.screen {
            Screen::Roster => handle_roster_keys(app, key),
            Screen::Chat => handle_chat_keys(app, key),
            Screen::Creator => handle_creator_keys(app, key),
        },
    }
}

/// Roster hotkeys (normal mode)
fn handle_roster_keys(app: &mut App, key: KeyEvent) -> EventResult {
    let count = app.registry.list_by_recency().len();
    match key.code {
        KeyCode::Char('q') => EventResult::Quit,
        KeyCode::Char('j') | KeyCode::Down => {
            if count > 0 {
                app.roster_selected = (app.roster_selected + 1).min(count - 1);
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.roster_selected = app.roster_selected.saturating_sub(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            app.open_chat();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('n') => {
            app.open_creator_new();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('e') => {
            app.open_creator_edit();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') => {
            if let Some(id) = app.selected_character_id() {
                let name = app
                    .registry
                    .get(&id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                app.set_overlay(Overlay::ConfirmDelete { id, name });
            }
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Chat hotkeys (normal mode)
fn handle_chat_keys(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.open_roster();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.scroll_down(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.scroll_up(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('G') => {
            app.scroll_to_bottom();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('g') => {
            app.chat_scroll = 0;
            app.scroll_locked_to_bottom = false;
            EventResult::NeedsRedraw
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }
        // Send the accumulated turn
        KeyCode::Char('t') | KeyCode::Enter => {
            app.request_submit_turn();
            EventResult::NeedsRedraw
        }
        // Review the correction on the most recent corrected message
        KeyCode::Char('c') => {
            if let Some(index) = latest_corrected_index(app) {
                app.set_overlay(Overlay::Correction(index));
            } else {
                app.set_status("No corrections yet.");
            }
            EventResult::NeedsRedraw
        }
        // Vocabulary glosses for the most recent AI message
        KeyCode::Char('v') => {
            if let Some(index) = latest_ai_index(app) {
                app.set_overlay(Overlay::Vocab(index));
            } else {
                app.set_status("No replies yet.");
            }
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Creator hotkeys (normal mode)
fn handle_creator_keys(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.open_roster();
            EventResult::NeedsRedraw
        }
        KeyCode::Tab | KeyCode::Char('j') | KeyCode::Down => {
            if let Some(form) = &mut app.creator {
                form.next_field();
            }
            EventResult::NeedsRedraw
        }
        // Generate a description from the idea field
        KeyCode::Char('G') => {
            let idea = app
                .creator
                .as_ref()
                .map(|f| f.idea.clone())
                .unwrap_or_default();
            if idea.trim().is_empty() {
                app.set_status("Fill in the idea field first (Tab, then i).");
            } else {
                app.busy = true;
                app.set_status("Generating description...");
                app.pending = Some(PendingAction::SuggestDescription(idea));
            }
            EventResult::NeedsRedraw
        }
        // Generate the avatar from the description
        KeyCode::Char('A') => {
            let ready = app
                .creator
                .as_ref()
                .is_some_and(|f| !f.draft.description.trim().is_empty());
            if ready {
                app.busy = true;
                app.set_status("Generating avatar...");
                app.pending = Some(PendingAction::GenerateAvatar);
            } else {
                app.set_status("Write or generate a description first.");
            }
            EventResult::NeedsRedraw
        }
        // Save
        KeyCode::Char('s') | KeyCode::Enter => {
            app.pending = Some(PendingAction::SaveCharacter);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle keys in INSERT mode
fn handle_insert_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            if app.screen == Screen::Creator {
                // Keep edits when leaving a form field
                app.commit_input();
            } else {
                app.clear_input();
            }
            app.enter_normal_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            app.commit_input();
            app.enter_normal_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.backspace();
            EventResult::NeedsRedraw
        }
        KeyCode::Delete => {
            app.delete();
            EventResult::NeedsRedraw
        }
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Home => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::End => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle keys in COMMAND mode
fn handle_command_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.enter_normal_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            let command = app.input_buffer().to_string();
            app.clear_input();
            app.enter_normal_mode();
            app.process_command(&command);
            if app.should_quit {
                return EventResult::Quit;
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            // Deleting the ':' leaves command mode
            app.backspace();
            if app.input_buffer().is_empty() {
                app.enter_normal_mode();
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle keys while an overlay is open
fn handle_overlay_key(app: &mut App, key: KeyEvent) -> EventResult {
    if matches!(app.overlay(), Some(Overlay::ApiKey)) {
        return handle_api_key_overlay(app, key);
    }
    let confirm_delete = matches!(app.overlay(), Some(Overlay::ConfirmDelete { .. }));
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter if confirm_delete => {
            if let Some(Overlay::ConfirmDelete { id, .. }) = app.overlay() {
                let id = id.clone();
                app.pending = Some(PendingAction::DeleteCharacter(id));
            }
            app.close_overlay();
            EventResult::NeedsRedraw
        }
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('n') | KeyCode::Enter => {
            app.close_overlay();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('?') => {
            app.close_overlay();
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// The credential overlay types straight into the input buffer; Enter
/// saves, Esc skips.
fn handle_api_key_overlay(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Enter => {
            app.submit_api_key_entry();
            EventResult::NeedsRedraw
        }
        KeyCode::Esc => {
            app.clear_input();
            app.close_overlay();
            app.set_status("No key saved. Use :key <api-key> to set one later.");
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.backspace();
            EventResult::NeedsRedraw
        }
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Index of the most recent user message carrying a correction.
fn latest_corrected_index(app: &App) -> Option<usize> {
    let conversation = app.conversation.as_ref()?;
    conversation
        .displayed()
        .iter()
        .rposition(|m| m.correction.is_some())
}

/// Index of the most recent AI message.
fn latest_ai_index(app: &App) -> Option<usize> {
    let conversation = app.conversation.as_ref()?;
    conversation
        .displayed()
        .iter()
        .rposition(|m| m.sender == Sender::Ai)
}
