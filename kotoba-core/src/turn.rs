//! Turn engine: accumulate pending user messages, submit them as one turn,
//! and reconcile the structured reply back into the conversation.
//!
//! A [`Conversation`] tracks the displayed message list and the pending-turn
//! buffer for one character. `submit_turn` is the single suspension point:
//! it snapshots the buffer, calls the gateway, splices corrections onto the
//! just-sent messages, then applies the AI's responses in order — persisting
//! after every appended AI message so a mid-turn interruption loses at most
//! the not-yet-appended remainder.

use crate::gateway::{ChatGateway, GatewayError, ResponseItem};
use crate::model::{Message, MessageContent};
use crate::registry::Registry;
use crate::store::StoreError;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Errors from the turn workflow.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Nothing to submit")]
    NothingPending,

    #[error("A turn is already in flight")]
    Busy,

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to persist history: {0}")]
    Store(#[from] StoreError),
}

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No pending input.
    #[default]
    Idle,
    /// One or more composed messages await submission.
    Accumulating,
    /// A turn is in flight; composing is disallowed.
    Submitting,
}

/// Pacing configuration for staggered AI replies.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Inclusive lower bound of the inter-message pause, in milliseconds.
    pub min_pause_ms: u64,
    /// Exclusive upper bound of the inter-message pause, in milliseconds.
    pub max_pause_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            min_pause_ms: 500,
            max_pause_ms: 2000,
        }
    }
}

impl TurnConfig {
    /// No pacing at all. For tests.
    pub fn instant() -> Self {
        Self {
            min_pause_ms: 0,
            max_pause_ms: 0,
        }
    }

    fn pause(&self) -> Duration {
        if self.max_pause_ms <= self.min_pause_ms {
            return Duration::from_millis(self.min_pause_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_pause_ms..self.max_pause_ms);
        Duration::from_millis(ms)
    }
}

/// Summary of a completed turn, for status display.
#[derive(Debug, Clone, Default)]
pub struct TurnSummary {
    /// How many pending user messages were submitted.
    pub submitted: usize,
    /// How many received a correction entry.
    pub corrected: usize,
    /// How many AI messages were appended.
    pub replies: usize,
    /// How many image responses were dropped after a generation failure.
    pub dropped_images: usize,
}

/// The active conversation with one character.
///
/// Invariant: `displayed` is always (persisted history) ++ (pending,
/// not-yet-submitted messages); after a successful `submit_turn` the two
/// converge exactly.
pub struct Conversation {
    character_id: String,
    displayed: Vec<Message>,
    pending: Vec<Message>,
    state: TurnState,
}

impl Conversation {
    /// Open a conversation over a character's persisted history.
    pub fn open(character_id: impl Into<String>, history: &[Message]) -> Self {
        Self {
            character_id: character_id.into(),
            displayed: history.to_vec(),
            pending: Vec::new(),
            state: TurnState::Idle,
        }
    }

    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    /// The full displayed message list.
    pub fn displayed(&self) -> &[Message] {
        &self.displayed
    }

    /// Messages composed but not yet submitted.
    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == TurnState::Submitting
    }

    /// Whether `submit_turn` would proceed: the pending buffer is non-empty,
    /// or this is an opening move (empty history, empty buffer).
    pub fn can_submit(&self) -> bool {
        !self.is_submitting()
            && (!self.pending.is_empty() || (self.displayed.is_empty() && self.pending.is_empty()))
    }

    /// Compose a plain-text user message. Allowed any time except while a
    /// turn is in flight.
    pub fn compose_text(&mut self, text: impl Into<String>) -> Result<(), TurnError> {
        self.compose(vec![MessageContent::Text(vec![
            crate::model::WordInfo::plain(text),
        ])])
    }

    /// Compose a user message carrying an image, with optional caption text.
    pub fn compose_image(
        &mut self,
        image_base64: String,
        caption: Option<String>,
    ) -> Result<(), TurnError> {
        let mut parts = vec![MessageContent::Image(image_base64)];
        if let Some(text) = caption.filter(|t| !t.trim().is_empty()) {
            parts.push(MessageContent::Text(vec![crate::model::WordInfo::plain(
                text,
            )]));
        }
        self.compose(parts)
    }

    /// Append a new user message to both the pending buffer and the
    /// displayed list.
    pub fn compose(&mut self, parts: Vec<MessageContent>) -> Result<(), TurnError> {
        if self.is_submitting() {
            return Err(TurnError::Busy);
        }
        let message = Message::user(parts);
        self.pending.push(message.clone());
        self.displayed.push(message);
        self.state = TurnState::Accumulating;
        Ok(())
    }

    /// Submit the accumulated turn.
    ///
    /// On success the corrected user messages replace their uncorrected
    /// counterparts positionally, the AI's responses are appended in reply
    /// order with a persisted write after each one, and displayed and
    /// persisted history converge. On gateway failure the snapshot is
    /// restored into the pending buffer so nothing composed is lost.
    pub async fn submit_turn<G: ChatGateway>(
        &mut self,
        gateway: &G,
        registry: &mut Registry,
        config: &TurnConfig,
    ) -> Result<TurnSummary, TurnError> {
        if self.is_submitting() {
            return Err(TurnError::Busy);
        }
        if !self.can_submit() {
            return Err(TurnError::NothingPending);
        }

        let character = registry
            .get(&self.character_id)
            .cloned()
            .ok_or_else(|| TurnError::UnknownCharacter(self.character_id.clone()))?;
        let history = character.chat_history.clone();
        let avatar = character.avatar.clone();

        // Snapshot and clear the pending buffer before suspending.
        let snapshot: Vec<Message> = std::mem::take(&mut self.pending);
        self.state = TurnState::Submitting;

        let reply = match gateway.turn_reply(&character, &history, &snapshot).await {
            Ok(reply) => reply,
            Err(e) => {
                // Roll back: the composed-but-unsent messages return to the
                // buffer; the displayed list keeps its uncorrected versions.
                self.pending = snapshot;
                self.state = TurnState::Accumulating;
                return Err(e.into());
            }
        };

        // Attach corrections by explicit index, then replace the exact tail
        // slice of the displayed list that corresponds to the snapshot.
        let corrected: Vec<Message> = snapshot
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let mut msg = msg.clone();
                msg.correction = reply.correction_for(i).cloned();
                msg
            })
            .collect();
        let corrected_count = corrected.iter().filter(|m| m.correction.is_some()).count();

        let tail_start = self.displayed.len() - snapshot.len();
        self.displayed.truncate(tail_start);
        self.displayed.extend(corrected.iter().cloned());

        let mut cumulative = history;
        cumulative.extend(corrected);

        let mut summary = TurnSummary {
            submitted: snapshot.len(),
            corrected: corrected_count,
            ..TurnSummary::default()
        };

        // Apply responses strictly in reply order. A failed image generation
        // drops that single item; the turn as a whole still succeeds.
        for item in &reply.responses {
            let ai_message = match item {
                ResponseItem::Text(words) => {
                    Message::ai(vec![MessageContent::Text(words.clone())])
                }
                ResponseItem::ImagePrompt(prompt) => {
                    match gateway.generate_chat_image(prompt, &avatar).await {
                        Ok(image) => Message::ai(vec![MessageContent::Image(image)]),
                        Err(e) => {
                            log::warn!("in-chat image generation failed, dropping: {e}");
                            summary.dropped_images += 1;
                            continue;
                        }
                    }
                }
            };

            self.displayed.push(ai_message.clone());
            cumulative.push(ai_message);
            summary.replies += 1;

            // One store write per AI message bounds the loss window. A
            // failed write still ends the turn: the conversation must not
            // stay in Submitting, or the user can never type again.
            if let Err(e) = registry
                .replace_history(&self.character_id, cumulative.clone())
                .await
            {
                self.state = TurnState::Idle;
                return Err(e.into());
            }

            tokio::time::sleep(config.pause()).await;
        }

        // A turn with no appended replies still needs the corrected user
        // messages persisted.
        if summary.replies == 0 {
            if let Err(e) = registry
                .replace_history(&self.character_id, cumulative)
                .await
            {
                self.state = TurnState::Idle;
                return Err(e.into());
            }
        }

        self.state = TurnState::Idle;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_move_allowed() {
        let conv = Conversation::open("c1", &[]);
        assert!(conv.can_submit());
    }

    #[test]
    fn test_empty_submit_rejected_with_history() {
        let history = vec![Message::user_text("before")];
        let conv = Conversation::open("c1", &history);
        assert!(!conv.can_submit());
    }

    #[test]
    fn test_compose_accumulates() {
        let history = vec![Message::user_text("before")];
        let mut conv = Conversation::open("c1", &history);
        assert_eq!(conv.state(), TurnState::Idle);

        conv.compose_text("こんにちは").unwrap();
        assert_eq!(conv.state(), TurnState::Accumulating);
        assert_eq!(conv.pending().len(), 1);
        assert_eq!(conv.displayed().len(), 2);
        assert!(conv.can_submit());
    }

    #[test]
    fn test_compose_image_with_caption() {
        let mut conv = Conversation::open("c1", &[]);
        conv.compose_image("YWJj".to_string(), Some("見て！".to_string()))
            .unwrap();
        assert_eq!(conv.pending()[0].parts.len(), 2);

        conv.compose_image("ZGVm".to_string(), Some("   ".to_string()))
            .unwrap();
        assert_eq!(conv.pending()[1].parts.len(), 1);
    }

    #[test]
    fn test_pause_range() {
        let config = TurnConfig::default();
        for _ in 0..32 {
            let pause = config.pause();
            assert!(pause >= Duration::from_millis(500));
            assert!(pause < Duration::from_millis(2000));
        }
        assert_eq!(TurnConfig::instant().pause(), Duration::ZERO);
    }
}
