//! Main application state and logic

use std::path::PathBuf;

use kotoba_core::creator::CharacterDraft;
use kotoba_core::gateway::ChatGateway;
use kotoba_core::media::read_image_base64;
use kotoba_core::turn::{Conversation, TurnConfig};
use kotoba_core::{GeminiGateway, Registry};

use crate::ui::theme::AppTheme;
use crate::ui::Overlay;

/// Vim-style input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal mode - navigation and hotkeys (default)
    #[default]
    Normal,
    /// Insert mode - free text input
    Insert,
    /// Command mode - entering : commands
    Command,
}

/// Which top-level screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// The character roster, most recent conversation first
    #[default]
    Roster,
    /// A chat with the selected character
    Chat,
    /// The character creation / edit form
    Creator,
}

/// Which creator form field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatorField {
    #[default]
    Name,
    Idea,
    Description,
}

/// The character creation form
#[derive(Debug, Clone, Default)]
pub struct CreatorForm {
    pub draft: CharacterDraft,
    /// The short concept fed to description generation
    pub idea: String,
    pub focus: CreatorField,
}

impl CreatorForm {
    pub fn field(&self, field: CreatorField) -> &str {
        match field {
            CreatorField::Name => &self.draft.name,
            CreatorField::Idea => &self.idea,
            CreatorField::Description => &self.draft.description,
        }
    }

    pub fn set_field(&mut self, field: CreatorField, value: String) {
        match field {
            CreatorField::Name => self.draft.name = value,
            CreatorField::Idea => self.idea = value,
            CreatorField::Description => self.draft.description = value,
        }
    }

    pub fn next_field(&mut self) {
        self.focus = match self.focus {
            CreatorField::Name => CreatorField::Idea,
            CreatorField::Idea => CreatorField::Description,
            CreatorField::Description => CreatorField::Name,
        };
    }
}

/// A deferred operation the main loop awaits between renders.
#[derive(Debug, Clone)]
pub enum PendingAction {
    SubmitTurn,
    AttachImage(PathBuf),
    SuggestDescription(String),
    GenerateAvatar,
    SaveCharacter,
    DeleteCharacter(String),
    Export(PathBuf),
    Import(PathBuf),
    SetApiKey(String),
}

/// Main application state
pub struct App {
    pub registry: Registry,
    pub theme: AppTheme,

    // Navigation
    pub screen: Screen,
    overlay: Option<Overlay>,
    pub roster_selected: usize,
    pub chat_scroll: usize,
    pub scroll_locked_to_bottom: bool,

    // The open chat, if any
    pub conversation: Option<Conversation>,
    pub turn_config: TurnConfig,

    // The creation form, if open
    pub creator: Option<CreatorForm>,

    // Input state
    pub input_mode: InputMode,
    input_buffer: String,
    cursor_position: usize,

    // Deferred work for the main loop
    pub pending: Option<PendingAction>,

    // Status
    status_message: Option<String>,
    pub should_quit: bool,
    pub busy: bool,
}

impl App {
    pub fn new(registry: Registry) -> Self {
        let mut app = Self {
            registry,
            theme: AppTheme::default(),
            screen: Screen::Roster,
            overlay: None,
            roster_selected: 0,
            chat_scroll: 0,
            scroll_locked_to_bottom: true,
            conversation: None,
            turn_config: TurnConfig::default(),
            creator: None,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            cursor_position: 0,
            pending: None,
            status_message: None,
            should_quit: false,
            busy: false,
        };
        app.seed_credential(std::env::var("GEMINI_API_KEY").ok());
        app
    }

    /// First-run credential setup. With no stored key, a key found in the
    /// environment is queued for persisting; otherwise the entry overlay
    /// opens so the app never starts silently unusable.
    fn seed_credential(&mut self, env_key: Option<String>) {
        if self.registry.api_key().is_some() {
            return;
        }
        match env_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                self.pending = Some(PendingAction::SetApiKey(key));
            }
            None => {
                self.set_overlay(Overlay::ApiKey);
            }
        }
    }

    /// Build a gateway from the stored credential, falling back to the
    /// environment.
    pub fn gateway(&self) -> GeminiGateway {
        let key = self
            .registry
            .api_key()
            .map(str::to_string)
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .unwrap_or_default();
        GeminiGateway::new(key)
    }

    /// Accept the key typed into the credential overlay. An empty buffer
    /// dismisses without saving; :key works at any later point.
    pub fn submit_api_key_entry(&mut self) {
        let key = self.input_buffer.trim().to_string();
        self.clear_input();
        self.close_overlay();
        if key.is_empty() {
            self.set_status("No key saved. Use :key <api-key> to set one later.");
        } else {
            self.pending = Some(PendingAction::SetApiKey(key));
        }
    }

    /// The id of the character selected on the roster.
    pub fn selected_character_id(&self) -> Option<String> {
        self.registry
            .list_by_recency()
            .get(self.roster_selected)
            .map(|c| c.id.clone())
    }

    /// Open the chat screen for the selected roster entry.
    pub fn open_chat(&mut self) {
        let Some(id) = self.selected_character_id() else {
            return;
        };
        let history = self
            .registry
            .get(&id)
            .map(|c| c.chat_history.clone())
            .unwrap_or_default();
        self.conversation = Some(Conversation::open(id, &history));
        self.screen = Screen::Chat;
        self.scroll_to_bottom();
    }

    /// Return to the roster, dropping any unsent buffer state.
    pub fn open_roster(&mut self) {
        self.conversation = None;
        self.creator = None;
        self.screen = Screen::Roster;
        let count = self.registry.list_by_recency().len();
        if count > 0 && self.roster_selected >= count {
            self.roster_selected = count - 1;
        }
    }

    /// Open a blank creation form.
    pub fn open_creator_new(&mut self) {
        self.creator = Some(CreatorForm::default());
        self.screen = Screen::Creator;
    }

    /// Open the form pre-filled from the selected character.
    pub fn open_creator_edit(&mut self) {
        let Some(id) = self.selected_character_id() else {
            return;
        };
        if let Some(character) = self.registry.get(&id) {
            self.creator = Some(CreatorForm {
                draft: CharacterDraft::edit_of(character),
                idea: String::new(),
                focus: CreatorField::Name,
            });
            self.screen = Screen::Creator;
        }
    }

    /// Enter command mode (starts with :)
    pub fn enter_command_mode(&mut self) {
        self.input_mode = InputMode::Command;
        self.input_buffer.clear();
        self.input_buffer.push(':');
        self.cursor_position = 1;
    }

    /// Enter insert mode. On the creator screen the buffer is seeded from
    /// the focused form field.
    pub fn enter_insert_mode(&mut self) {
        if self.busy {
            self.set_status("Please wait...");
            return;
        }
        if self.screen == Screen::Creator {
            if let Some(form) = &self.creator {
                let value = form.field(form.focus).to_string();
                self.set_input(value);
            }
        }
        self.input_mode = InputMode::Insert;
    }

    /// Exit to normal mode
    pub fn enter_normal_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        if self.input_buffer.starts_with(':') {
            self.clear_input();
        }
    }

    /// Commit the insert buffer. On the chat screen this composes a pending
    /// message; on the creator screen it writes the focused field back.
    pub fn commit_input(&mut self) {
        match self.screen {
            Screen::Chat => {
                let text = std::mem::take(&mut self.input_buffer);
                self.cursor_position = 0;
                if text.trim().is_empty() {
                    return;
                }
                if let Some(conversation) = &mut self.conversation {
                    match conversation.compose_text(text) {
                        Ok(()) => self.scroll_to_bottom(),
                        Err(e) => self.set_status(e.to_string()),
                    }
                }
            }
            Screen::Creator => {
                let value = std::mem::take(&mut self.input_buffer);
                self.cursor_position = 0;
                if let Some(form) = &mut self.creator {
                    form.set_field(form.focus, value);
                }
            }
            Screen::Roster => {
                self.clear_input();
            }
        }
    }

    /// Queue the accumulated turn for the main loop.
    pub fn request_submit_turn(&mut self) {
        let ready = self
            .conversation
            .as_ref()
            .is_some_and(|c| c.can_submit());
        if !ready {
            self.set_status("Nothing to send. Press 'i' to write a message.");
            return;
        }
        self.busy = true;
        self.set_status("相手の返事を待っています...");
        self.pending = Some(PendingAction::SubmitTurn);
    }

    /// Process a colon command. Returns true when the command was recognized.
    pub fn process_command(&mut self, command: &str) -> bool {
        let cmd = command.trim_start_matches(':');
        let parts: Vec<&str> = cmd.split_whitespace().collect();

        if parts.is_empty() {
            return false;
        }

        match parts[0] {
            "q" | "quit" | "exit" => {
                self.should_quit = true;
                true
            }
            "help" | "h" => {
                self.set_overlay(Overlay::Help);
                true
            }
            "export" => {
                let path = parts.get(1).copied().unwrap_or("kotoba-backup.json");
                self.pending = Some(PendingAction::Export(PathBuf::from(path)));
                true
            }
            "import" => {
                let path = parts.get(1).copied().unwrap_or("kotoba-backup.json");
                self.pending = Some(PendingAction::Import(PathBuf::from(path)));
                true
            }
            "key" => {
                if let Some(key) = parts.get(1) {
                    self.pending = Some(PendingAction::SetApiKey(key.to_string()));
                } else {
                    self.set_status("Usage: :key <api-key>");
                }
                true
            }
            "image" => {
                if self.screen != Screen::Chat {
                    self.set_status("Open a chat first");
                } else if let Some(path) = parts.get(1) {
                    self.pending = Some(PendingAction::AttachImage(PathBuf::from(path)));
                } else {
                    self.set_status("Usage: :image <path>");
                }
                true
            }
            _ => {
                self.set_status(format!("Unknown command: {}", parts[0]));
                false
            }
        }
    }

    /// Perform a deferred action. Called from the main loop between renders.
    pub async fn perform(&mut self, action: PendingAction) {
        match action {
            PendingAction::SubmitTurn => self.perform_submit_turn().await,
            PendingAction::AttachImage(path) => match read_image_base64(&path).await {
                Ok(image) => {
                    if let Some(conversation) = &mut self.conversation {
                        match conversation.compose_image(image.data, None) {
                            Ok(()) => {
                                self.set_status(format!("Attached {}", path.display()));
                                self.scroll_to_bottom();
                            }
                            Err(e) => self.set_status(e.to_string()),
                        }
                    }
                }
                Err(e) => self.set_status(format!("Failed to attach image: {e}")),
            },
            PendingAction::SuggestDescription(idea) => {
                let gateway = self.gateway();
                match gateway.describe_character(&idea).await {
                    Ok(text) => {
                        if let Some(form) = &mut self.creator {
                            form.draft.description = text;
                        }
                        self.set_status("Description ready. Review and edit as you like.");
                    }
                    Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
                }
            }
            PendingAction::GenerateAvatar => {
                let gateway = self.gateway();
                if let Some(form) = &mut self.creator {
                    match form.draft.generate_avatar(&gateway).await {
                        Ok(()) => self.set_status("Avatar generated."),
                        Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
                    }
                }
            }
            PendingAction::SaveCharacter => self.perform_save_character().await,
            PendingAction::DeleteCharacter(id) => {
                match self.registry.remove(&id).await {
                    Ok(true) => self.set_status("Character deleted."),
                    Ok(false) => self.set_status("Character was already gone."),
                    Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
                }
                self.open_roster();
            }
            PendingAction::Export(path) => match self.registry.export(&path).await {
                Ok(()) => self.set_status(format!("Exported to {}", path.display())),
                Err(e) => self.set_overlay(Overlay::Error(format!("Export failed: {e}"))),
            },
            PendingAction::Import(path) => match self.registry.import(&path).await {
                Ok(()) => {
                    self.open_roster();
                    self.roster_selected = 0;
                    self.set_status(format!("Imported from {}", path.display()));
                }
                Err(e) => self.set_overlay(Overlay::Error(format!("Import failed: {e}"))),
            },
            PendingAction::SetApiKey(key) => match self.registry.set_api_key(key).await {
                Ok(()) => self.set_status("API key saved."),
                Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
            },
        }
        self.busy = false;
    }

    async fn perform_submit_turn(&mut self) {
        let gateway = self.gateway();
        let config = self.turn_config.clone();
        let Some(conversation) = &mut self.conversation else {
            return;
        };
        match conversation
            .submit_turn(&gateway, &mut self.registry, &config)
            .await
        {
            Ok(summary) => {
                let note = match summary.corrected {
                    0 => format!("{} replies", summary.replies),
                    n => format!("{} replies, {} correction(s)", summary.replies, n),
                };
                self.set_status(note);
                self.scroll_to_bottom();
            }
            Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
        }
    }

    async fn perform_save_character(&mut self) {
        let Some(form) = self.creator.take() else {
            return;
        };
        let editing = form.draft.is_edit();
        match form.draft.clone().build() {
            Ok(character) => {
                let result = if editing {
                    self.registry.update(character).await.map(|_| ())
                } else {
                    self.registry.add(character).await
                };
                match result {
                    Ok(()) => {
                        self.set_status("Character saved.");
                        self.open_roster();
                    }
                    Err(e) => self.set_overlay(Overlay::Error(e.to_string())),
                }
            }
            Err(e) => {
                // Validation failed; reopen the form so nothing is lost.
                self.set_status(e.to_string());
                self.creator = Some(form);
            }
        }
    }

    /// Scroll chat to bottom and lock to bottom
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = usize::MAX / 2;
        self.scroll_locked_to_bottom = true;
    }

    /// Scroll chat up (unlocks from bottom)
    pub fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.estimate_max_scroll();
        if self.chat_scroll > max_scroll {
            self.chat_scroll = max_scroll;
        }
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.scroll_locked_to_bottom = false;
    }

    /// Scroll chat down
    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.estimate_max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll + 100);
    }

    /// Conservative line estimate for scroll capping, assuming ~60 char
    /// effective width.
    fn estimate_max_scroll(&self) -> usize {
        const ESTIMATED_WIDTH: usize = 60;
        const ESTIMATED_VISIBLE_HEIGHT: usize = 20;

        let Some(conversation) = &self.conversation else {
            return 0;
        };
        let estimated_lines: usize = conversation
            .displayed()
            .iter()
            .map(|m| (m.plain_text().chars().count() / ESTIMATED_WIDTH).max(1) + 1)
            .sum();
        estimated_lines.saturating_sub(ESTIMATED_VISIBLE_HEIGHT)
    }

    // =========================================================================
    // Input buffer editing (unicode-safe)
    // =========================================================================

    /// Handle a typed character (unicode-safe)
    pub fn type_char(&mut self, c: char) {
        let byte_pos = self
            .input_buffer
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input_buffer.len());
        self.input_buffer.insert(byte_pos, c);
        self.cursor_position += 1;
    }

    /// Handle backspace (unicode-safe)
    pub fn backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position)
            {
                self.input_buffer
                    .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
            }
        }
    }

    /// Handle delete (unicode-safe)
    pub fn delete(&mut self) {
        let char_count = self.input_buffer.chars().count();
        if self.cursor_position < char_count {
            if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position)
            {
                self.input_buffer
                    .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
            }
        }
    }

    /// Move cursor left
    pub fn cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right
    pub fn cursor_right(&mut self) {
        let char_count = self.input_buffer.chars().count();
        self.cursor_position = (self.cursor_position + 1).min(char_count);
    }

    /// Move cursor to start
    pub fn cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to end (unicode-safe)
    pub fn cursor_end(&mut self) {
        self.cursor_position = self.input_buffer.chars().count();
    }

    /// Set input buffer content and move cursor to end (unicode-safe)
    pub fn set_input(&mut self, content: impl Into<String>) {
        self.input_buffer = content.into();
        self.cursor_position = self.input_buffer.chars().count();
    }

    /// Clear the input buffer
    pub fn clear_input(&mut self) {
        self.input_buffer.clear();
        self.cursor_position = 0;
    }

    // =========================================================================
    // Status and overlay
    // =========================================================================

    /// Set status message (always overwrites)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Get the current status message
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Get the current input buffer
    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    /// Get the current cursor position
    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }

    /// Get the current overlay
    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Set the overlay
    pub fn set_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    /// Close any open overlay
    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Check if an overlay is currently open
    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Toggle help overlay
    pub fn toggle_help(&mut self) {
        if matches!(self.overlay, Some(Overlay::Help)) {
            self.overlay = None;
        } else {
            self.overlay = Some(Overlay::Help);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kotoba_core::model::AppData;
    use kotoba_core::store::Store;

    fn registry(api_key: Option<&str>) -> Registry {
        let store = Store::new("unused-test-path.json");
        Registry::with_data(
            store,
            AppData {
                api_key: api_key.map(str::to_string),
                ..AppData::default()
            },
        )
    }

    /// Build an app and re-run the startup credential check with an
    /// explicit environment value, so the test is independent of the
    /// process environment.
    fn app_with(stored_key: Option<&str>, env_key: Option<&str>) -> App {
        let mut app = App::new(registry(Some("placeholder")));
        app.registry = registry(stored_key);
        app.pending = None;
        app.close_overlay();
        app.seed_credential(env_key.map(str::to_string));
        app
    }

    #[test]
    fn test_missing_key_opens_entry_overlay() {
        let app = app_with(None, None);
        assert!(matches!(app.overlay(), Some(Overlay::ApiKey)));
        assert!(app.pending.is_none());
    }

    #[test]
    fn test_env_key_seeds_stored_credential() {
        let app = app_with(None, Some("AIza-from-env"));
        assert!(app.overlay().is_none());
        assert!(matches!(
            app.pending,
            Some(PendingAction::SetApiKey(ref k)) if k == "AIza-from-env"
        ));
    }

    #[test]
    fn test_stored_key_skips_startup_prompt() {
        let app = app_with(Some("AIza-stored"), Some("AIza-from-env"));
        assert!(app.overlay().is_none());
        assert!(app.pending.is_none());
    }

    #[test]
    fn test_blank_env_key_is_ignored() {
        let app = app_with(None, Some("   "));
        assert!(matches!(app.overlay(), Some(Overlay::ApiKey)));
        assert!(app.pending.is_none());
    }

    #[test]
    fn test_overlay_entry_queues_save() {
        let mut app = app_with(None, None);
        app.set_input("  AIza-typed  ");
        app.submit_api_key_entry();
        assert!(app.overlay().is_none());
        assert!(matches!(
            app.pending,
            Some(PendingAction::SetApiKey(ref k)) if k == "AIza-typed"
        ));
        assert!(app.input_buffer().is_empty());
    }

    #[test]
    fn test_overlay_entry_empty_dismisses_without_save() {
        let mut app = app_with(None, None);
        app.submit_api_key_entry();
        assert!(app.overlay().is_none());
        assert!(app.pending.is_none());
        assert!(app.status_message().is_some());
    }
}
