//! Character creation and editing.
//!
//! A [`CharacterDraft`] collects the fields of a new or edited character,
//! optionally delegating description and avatar generation to the gateway,
//! and validates them before a [`Character`] is built.

use crate::gateway::{ChatGateway, GatewayError};
use crate::model::{Character, Message};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Name must not be empty")]
    MissingName,

    #[error("Description must not be empty")]
    MissingDescription,

    #[error("Avatar must not be empty")]
    MissingAvatar,
}

/// Mutable working state for the creation and edit workflows.
#[derive(Debug, Clone, Default)]
pub struct CharacterDraft {
    pub name: String,
    pub description: String,
    pub avatar: String,
    /// Set when editing; the built character keeps this id and history.
    existing: Option<(String, Vec<Message>)>,
}

impl CharacterDraft {
    /// An empty draft for a brand-new character.
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft pre-filled from an existing character. Building it preserves
    /// the character's id and chat history.
    pub fn edit_of(character: &Character) -> Self {
        Self {
            name: character.name.clone(),
            description: character.description.clone(),
            avatar: character.avatar.clone(),
            existing: Some((character.id.clone(), character.chat_history.clone())),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.existing.is_some()
    }

    /// Expand a short idea into a full persona description. The gateway
    /// already degrades transport failures to placeholder text, so only a
    /// missing API key fails here.
    pub async fn suggest_description<G: ChatGateway>(
        &mut self,
        gateway: &G,
        idea: &str,
    ) -> Result<(), GatewayError> {
        self.description = gateway.describe_character(idea).await?;
        Ok(())
    }

    /// Generate an avatar image from the current description.
    pub async fn generate_avatar<G: ChatGateway>(
        &mut self,
        gateway: &G,
    ) -> Result<(), GatewayError> {
        self.avatar = gateway.generate_avatar(&self.description).await?;
        Ok(())
    }

    /// Check all required fields are present.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::MissingName);
        }
        if self.description.trim().is_empty() {
            return Err(DraftError::MissingDescription);
        }
        if self.avatar.trim().is_empty() {
            return Err(DraftError::MissingAvatar);
        }
        Ok(())
    }

    /// Validate and produce the finished character. A new draft mints a
    /// fresh id with empty history; an edit draft keeps both.
    pub fn build(self) -> Result<Character, DraftError> {
        self.validate()?;
        let (id, chat_history) = match self.existing {
            Some((id, history)) => (id, history),
            None => (Character::mint_id(), Vec::new()),
        };
        Ok(Character {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            avatar: self.avatar,
            chat_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageContent;

    #[test]
    fn test_validation_order() {
        let mut draft = CharacterDraft::new();
        assert_eq!(draft.validate(), Err(DraftError::MissingName));

        draft.name = "健太".to_string();
        assert_eq!(draft.validate(), Err(DraftError::MissingDescription));

        draft.description = "A friendly student from Osaka.".to_string();
        assert_eq!(draft.validate(), Err(DraftError::MissingAvatar));

        draft.avatar = "YWJj".to_string();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_whitespace_is_empty() {
        let mut draft = CharacterDraft::new();
        draft.name = "   ".to_string();
        assert_eq!(draft.validate(), Err(DraftError::MissingName));
    }

    #[test]
    fn test_new_draft_mints_id() {
        let mut draft = CharacterDraft::new();
        draft.name = "葵".to_string();
        draft.description = "An art student.".to_string();
        draft.avatar = "YWJj".to_string();

        let character = draft.build().unwrap();
        assert!(character.id.starts_with("char_"));
        assert!(character.chat_history.is_empty());
        assert_eq!(character.name, "葵");
    }

    #[test]
    fn test_edit_preserves_id_and_history() {
        let mut original = Character {
            id: "char_42".to_string(),
            name: "健太".to_string(),
            description: "A student.".to_string(),
            avatar: "YWJj".to_string(),
            chat_history: Vec::new(),
        };
        original
            .chat_history
            .push(Message::user_text("やあ"));

        let mut draft = CharacterDraft::edit_of(&original);
        assert!(draft.is_edit());
        draft.name = "健太郎".to_string();

        let rebuilt = draft.build().unwrap();
        assert_eq!(rebuilt.id, "char_42");
        assert_eq!(rebuilt.name, "健太郎");
        assert_eq!(rebuilt.chat_history.len(), 1);
        assert!(matches!(
            rebuilt.chat_history[0].parts[0],
            MessageContent::Text(_)
        ));
    }
}
