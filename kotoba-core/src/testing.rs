//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockGateway` for deterministic testing without API calls
//! - Fixture helpers for building characters and stores

use crate::gateway::{ChatGateway, GatewayError, TurnReply};
use crate::model::{Character, Message, WordInfo};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock inference gateway that returns scripted replies.
///
/// Use this for deterministic tests without API calls. Turn replies and
/// image results are consumed in queue order; an exhausted queue fails the
/// call, so a test that over-submits fails loudly instead of hanging.
#[derive(Default)]
pub struct MockGateway {
    turn_replies: Mutex<VecDeque<Result<TurnReply, GatewayError>>>,
    images: Mutex<VecDeque<Result<String, GatewayError>>>,
    descriptions: Mutex<VecDeque<String>>,
    calls: Mutex<CallCounts>,
}

/// How many times each gateway operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub describe: usize,
    pub avatar: usize,
    pub turn: usize,
    pub chat_image: usize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful turn reply.
    pub fn queue_reply(&self, reply: TurnReply) {
        self.turn_replies.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a turn failure.
    pub fn queue_turn_failure(&self, error: GatewayError) {
        self.turn_replies.lock().unwrap().push_back(Err(error));
    }

    /// Queue a successful image result, shared by the avatar and in-chat
    /// image operations.
    pub fn queue_image(&self, base64: impl Into<String>) {
        self.images.lock().unwrap().push_back(Ok(base64.into()));
    }

    /// Queue an image failure.
    pub fn queue_image_failure(&self) {
        self.images
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::NoImage));
    }

    /// Queue a description result.
    pub fn queue_description(&self, text: impl Into<String>) {
        self.descriptions.lock().unwrap().push_back(text.into());
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.lock().unwrap()
    }

    fn next_image(&self) -> Result<String, GatewayError> {
        self.images
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::NoImage))
    }
}

impl ChatGateway for MockGateway {
    async fn describe_character(&self, _idea: &str) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().describe += 1;
        Ok(self
            .descriptions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "A scripted description.".to_string()))
    }

    async fn generate_avatar(&self, _description: &str) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().avatar += 1;
        self.next_image()
    }

    async fn turn_reply(
        &self,
        _character: &Character,
        _history: &[Message],
        _pending: &[Message],
    ) -> Result<TurnReply, GatewayError> {
        self.calls.lock().unwrap().turn += 1;
        self.turn_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::NoApiKey))
    }

    async fn generate_chat_image(
        &self,
        _image_prompt: &str,
        _reference_avatar: &str,
    ) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().chat_image += 1;
        self.next_image()
    }
}

/// A character fixture with a fixed id and empty history.
pub fn sample_character(id: &str, name: &str) -> Character {
    Character {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{name} is a test fixture."),
        avatar: "aWNvbg==".to_string(),
        chat_history: Vec::new(),
    }
}

/// A single-sentence AI text reply with no corrections.
pub fn text_only_reply(text: &str) -> TurnReply {
    TurnReply {
        corrections: Vec::new(),
        responses: vec![crate::gateway::ResponseItem::Text(vec![WordInfo::plain(
            text,
        )])],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let gateway = MockGateway::new();
        gateway.queue_reply(text_only_reply("一つ目"));
        gateway.queue_reply(text_only_reply("二つ目"));

        let character = sample_character("c1", "健太");
        let first = gateway.turn_reply(&character, &[], &[]).await.unwrap();
        let second = gateway.turn_reply(&character, &[], &[]).await.unwrap();

        assert_eq!(first.responses.len(), 1);
        assert_eq!(second.responses.len(), 1);
        assert_eq!(gateway.calls().turn, 2);
    }

    #[tokio::test]
    async fn test_exhausted_queue_fails() {
        let gateway = MockGateway::new();
        let character = sample_character("c1", "健太");
        assert!(gateway.turn_reply(&character, &[], &[]).await.is_err());
        assert!(gateway.generate_avatar("anyone").await.is_err());
    }

    #[tokio::test]
    async fn test_image_queue_shared() {
        let gateway = MockGateway::new();
        gateway.queue_image("YXZhdGFy");
        gateway.queue_image_failure();

        assert_eq!(gateway.generate_avatar("x").await.unwrap(), "YXZhdGFy");
        assert!(gateway.generate_chat_image("x", "y").await.is_err());
        assert_eq!(gateway.calls().avatar, 1);
        assert_eq!(gateway.calls().chat_image, 1);
    }
}
