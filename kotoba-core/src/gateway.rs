//! Remote inference gateway: the request/response boundary to the
//! generative-AI service.
//!
//! [`ChatGateway`] is the seam the turn engine and the creator workflow are
//! generic over; [`GeminiGateway`] is the production implementation. The
//! structured turn reply crosses a strict decode step — any payload that
//! does not match the closed schema is rejected as a parse error rather
//! than trusted.

use crate::model::{Character, Correction, Message, WordInfo};
use crate::prompts;
use gemini::{Content, Gemini, ModelKind, Modality, Part, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("APIキーが設定されていません。")]
    NoApiKey,

    #[error("AIとの通信に失敗しました。APIキーが正しいか確認するか、ネットワーク接続を確認してもう一度お試しください。")]
    Api(#[source] gemini::Error),

    #[error("Failed to parse turn reply: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No image was generated.")]
    NoImage,
}

/// A correction paired with the index of the pending user message it
/// applies to. The model may omit entries for messages it judges fine, so
/// matching is by explicit index, never by array position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCorrection {
    pub user_message_index: usize,
    #[serde(flatten)]
    pub correction: Correction,
}

/// One entry of the model's reply: a tokenized text message, or a prompt
/// to forward to the image generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ResponseItem {
    Text(Vec<WordInfo>),
    ImagePrompt(String),
}

/// The structured reply to one submitted turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReply {
    #[serde(default)]
    pub corrections: Vec<TurnCorrection>,
    #[serde(default)]
    pub responses: Vec<ResponseItem>,
}

impl TurnReply {
    /// The correction for the pending user message at `index`, if the model
    /// provided one.
    pub fn correction_for(&self, index: usize) -> Option<&Correction> {
        self.corrections
            .iter()
            .find(|c| c.user_message_index == index)
            .map(|c| &c.correction)
    }
}

/// Decode the model's JSON text into a [`TurnReply`], rejecting payloads
/// that do not match the schema. Half-annotated words are normalized to
/// unannotated so the reading/meaning both-or-neither invariant holds.
pub fn parse_turn_reply(json_text: &str) -> Result<TurnReply, serde_json::Error> {
    let mut reply: TurnReply = serde_json::from_str(json_text.trim())?;
    for item in &mut reply.responses {
        if let ResponseItem::Text(words) = item {
            for word in words {
                if word.reading.is_none() || word.meaning.is_none() {
                    word.reading = None;
                    word.meaning = None;
                }
            }
        }
    }
    Ok(reply)
}

/// The four inference operations the app delegates to the remote service.
///
/// All operations are fail-fast (no retry) and require the credential the
/// implementation was built with; a missing credential fails immediately.
pub trait ChatGateway {
    /// Generate a free-form character description. Transport failures are
    /// swallowed into a placeholder string — the one asymmetric error
    /// policy at this boundary.
    fn describe_character(
        &self,
        idea: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// Generate an avatar portrait; errors when the service returns no
    /// image payload.
    fn generate_avatar(
        &self,
        description: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// The structured turn call: prior history plus the pending user
    /// messages in, corrections plus staggered responses out.
    fn turn_reply(
        &self,
        character: &Character,
        history: &[Message],
        pending: &[Message],
    ) -> impl std::future::Future<Output = Result<TurnReply, GatewayError>> + Send;

    /// Image-to-image continuity call for in-chat images, seeded with the
    /// character's avatar.
    fn generate_chat_image(
        &self,
        image_prompt: &str,
        reference_avatar: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;
}

/// Production gateway backed by the Gemini API.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Gemini,
    has_key: bool,
}

impl GeminiGateway {
    /// Create a gateway with the given API credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            has_key: !api_key.is_empty(),
            client: Gemini::new(api_key),
        }
    }

    fn ensure_key(&self) -> Result<(), GatewayError> {
        if self.has_key {
            Ok(())
        } else {
            Err(GatewayError::NoApiKey)
        }
    }

    async fn generate_image(&self, parts: Vec<Part>) -> Result<String, GatewayError> {
        let request = Request::new(vec![Content::user(parts)])
            .with_model(ModelKind::Image)
            .with_response_modalities(vec![Modality::Image, Modality::Text]);

        let response = self
            .client
            .generate(request)
            .await
            .map_err(GatewayError::Api)?;

        response
            .first_inline_data()
            .map(|(_, data)| data.to_string())
            .ok_or(GatewayError::NoImage)
    }
}

impl ChatGateway for GeminiGateway {
    async fn describe_character(&self, idea: &str) -> Result<String, GatewayError> {
        self.ensure_key()?;

        let request = Request::from_prompt(prompts::description_prompt(idea))
            .with_thinking_budget(0);

        match self.client.generate(request).await {
            Ok(response) => Ok(response.text()),
            Err(e) => {
                log::warn!("character description generation failed: {e}");
                Ok("Failed to generate description. Please try again.".to_string())
            }
        }
    }

    async fn generate_avatar(&self, description: &str) -> Result<String, GatewayError> {
        self.ensure_key()?;
        self.generate_image(vec![Part::text(prompts::avatar_prompt(description))])
            .await
    }

    async fn turn_reply(
        &self,
        character: &Character,
        history: &[Message],
        pending: &[Message],
    ) -> Result<TurnReply, GatewayError> {
        self.ensure_key()?;

        // Prior turns collapse to alternating user/model text; the pending
        // turn keeps its raw content, with images inlined as JPEG bytes.
        let mut contents: Vec<Content> = history
            .iter()
            .map(|msg| {
                let parts = msg.parts.iter().map(|p| Part::text(p.plain_text())).collect();
                match msg.sender {
                    crate::model::Sender::User => Content::user(parts),
                    crate::model::Sender::Ai => Content::model(parts),
                }
            })
            .collect();

        let pending_parts: Vec<Part> = pending
            .iter()
            .flat_map(|msg| msg.parts.iter())
            .map(|part| match part {
                crate::model::MessageContent::Text(_) => Part::text(part.plain_text()),
                crate::model::MessageContent::Image(data) => {
                    Part::inline_data("image/jpeg", data.clone())
                }
            })
            .collect();
        contents.push(Content::user(pending_parts));

        let request = Request::new(contents)
            .with_system(prompts::turn_system_prompt(character))
            .with_response_mime_type("application/json")
            .with_thinking_budget(0);

        let response = self
            .client
            .generate(request)
            .await
            .map_err(GatewayError::Api)?;

        Ok(parse_turn_reply(&response.text())?)
    }

    async fn generate_chat_image(
        &self,
        image_prompt: &str,
        reference_avatar: &str,
    ) -> Result<String, GatewayError> {
        self.ensure_key()?;
        self.generate_image(vec![
            Part::inline_data("image/png", reference_avatar),
            Part::text(prompts::chat_image_prompt(image_prompt)),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_turn_reply() {
        let reply = parse_turn_reply(
            r#"{
                "corrections": [
                    {"userMessageIndex": 1, "isCorrect": false,
                     "feedback": "惜しい！", "correctedText": "こんにちは！"}
                ],
                "responses": [
                    {"type": "text", "content": [
                        {"word": "今日", "reading": null, "meaning": null},
                        {"word": "天気", "reading": "てんき", "meaning": "空の様子"}
                    ]},
                    {"type": "image_prompt", "content": "A selfie in Harajuku"}
                ]
            }"#,
        )
        .expect("should parse");

        assert_eq!(reply.corrections.len(), 1);
        assert_eq!(reply.corrections[0].user_message_index, 1);
        assert!(!reply.corrections[0].correction.is_correct);
        assert_eq!(reply.responses.len(), 2);
        assert!(matches!(reply.responses[1], ResponseItem::ImagePrompt(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_response_type() {
        let result = parse_turn_reply(
            r#"{"corrections": [], "responses": [{"type": "video", "content": "x"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_turn_reply("I am not JSON at all").is_err());
    }

    #[test]
    fn test_parse_tolerates_missing_arrays() {
        let reply = parse_turn_reply("{}").expect("empty object is a valid reply");
        assert!(reply.corrections.is_empty());
        assert!(reply.responses.is_empty());
    }

    #[test]
    fn test_parse_normalizes_half_annotated_words() {
        let reply = parse_turn_reply(
            r#"{"responses": [{"type": "text", "content": [
                {"word": "天気", "reading": "てんき", "meaning": null}
            ]}]}"#,
        )
        .unwrap();

        let ResponseItem::Text(words) = &reply.responses[0] else {
            panic!("expected text response");
        };
        assert!(words[0].reading.is_none());
        assert!(words[0].meaning.is_none());
        assert!(!words[0].is_annotated());
    }

    #[test]
    fn test_correction_lookup_by_index() {
        let reply = parse_turn_reply(
            r#"{"corrections": [
                {"userMessageIndex": 2, "isCorrect": true,
                 "feedback": "すごい！", "correctedText": "そのまま"}
            ]}"#,
        )
        .unwrap();

        assert!(reply.correction_for(0).is_none());
        assert!(reply.correction_for(1).is_none());
        assert_eq!(reply.correction_for(2).unwrap().feedback, "すごい！");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        let gateway = GeminiGateway::new("");
        let data = crate::model::AppData::starter();
        let kenta = &data.characters[0];

        assert!(matches!(
            gateway.describe_character("idea").await,
            Err(GatewayError::NoApiKey)
        ));
        assert!(matches!(
            gateway.generate_avatar("desc").await,
            Err(GatewayError::NoApiKey)
        ));
        assert!(matches!(
            gateway.turn_reply(kenta, &[], &[]).await,
            Err(GatewayError::NoApiKey)
        ));
        assert!(matches!(
            gateway.generate_chat_image("p", "avatar").await,
            Err(GatewayError::NoApiKey)
        ));
    }
}
