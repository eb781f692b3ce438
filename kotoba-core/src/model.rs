//! Core data model for characters, messages, and the persisted document.
//!
//! The serde wire format uses camelCase field names (`chatHistory`, `apiKey`,
//! `userMessageIndex`, ...) so exported documents stay interchangeable with
//! backups produced by earlier versions of the app.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A single lexical token, optionally annotated with a furigana reading and
/// a simple meaning for above-threshold vocabulary.
///
/// Invariant: `reading` and `meaning` are both present or both absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordInfo {
    pub word: String,
    pub reading: Option<String>,
    pub meaning: Option<String>,
}

impl WordInfo {
    /// A word below the annotation threshold (no reading, no meaning).
    pub fn plain(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            reading: None,
            meaning: None,
        }
    }

    /// An above-threshold word carrying its reading and meaning.
    pub fn annotated(
        word: impl Into<String>,
        reading: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        Self {
            word: word.into(),
            reading: Some(reading.into()),
            meaning: Some(meaning.into()),
        }
    }

    /// Whether this word carries a vocabulary annotation.
    pub fn is_annotated(&self) -> bool {
        self.reading.is_some() && self.meaning.is_some()
    }
}

/// Structured grammar feedback attached to a user message after a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub is_correct: bool,
    pub feedback: String,
    pub corrected_text: String,
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One displayable unit within a message: annotated text or an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum MessageContent {
    Text(Vec<WordInfo>),
    /// Base64-encoded image payload.
    Image(String),
}

impl MessageContent {
    /// Collapse this part to plain text; images become a placeholder marker.
    pub fn plain_text(&self) -> String {
        match self {
            MessageContent::Text(words) => {
                words.iter().map(|w| w.word.as_str()).collect::<String>()
            }
            MessageContent::Image(_) => "[IMAGE]".to_string(),
        }
    }
}

/// A chat message. Immutable once appended to a persisted history, except
/// that a user message gains its `correction` once the enclosing turn
/// completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub parts: Vec<MessageContent>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
}

impl Message {
    /// Create a user message from free text (a single unannotated word run,
    /// the way composed input is stored before the model tokenizes it).
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![MessageContent::Text(vec![WordInfo::plain(text)])])
    }

    /// Create a user message with arbitrary parts.
    pub fn user(parts: Vec<MessageContent>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4()),
            sender: Sender::User,
            parts,
            timestamp: now_millis(),
            correction: None,
        }
    }

    /// Create an AI message with the given parts.
    pub fn ai(parts: Vec<MessageContent>) -> Self {
        Self {
            id: format!("msg_ai_{}", Uuid::new_v4()),
            sender: Sender::Ai,
            parts,
            timestamp: now_millis(),
            correction: None,
        }
    }

    /// All parts collapsed to displayable plain text.
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An AI friend character and their full chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    /// Base64-encoded avatar image.
    pub avatar: String,
    pub description: String,
    #[serde(default)]
    pub chat_history: Vec<Message>,
}

impl Character {
    /// Mint a fresh time-based character id.
    pub fn mint_id() -> String {
        format!("char_{}", now_millis())
    }

    /// Sort key for recency ordering: timestamp of the last chat message,
    /// else a creation time embedded in the id, else 0.
    pub fn recency_key(&self) -> i64 {
        if let Some(last) = self.chat_history.last() {
            return last.timestamp;
        }
        self.id
            .split('_')
            .nth(1)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// The entire persisted document: all characters plus the API credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// 1x1 transparent PNG used for the starter characters' avatars.
const STARTER_AVATAR_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

impl AppData {
    /// A fresh document seeded with the two starter characters.
    pub fn starter() -> Self {
        Self {
            characters: vec![
                Character {
                    id: "default_kenta".to_string(),
                    name: "健太".to_string(),
                    avatar: STARTER_AVATAR_PNG.to_string(),
                    description: "元気でスポーツ好きな高校生。休日はバスケをしたり、\
                                  友達とラーメンを食べに行くのが好き。少しおっちょこちょいな\
                                  ところもあるけど、誰にでも優しい人気者。"
                        .to_string(),
                    chat_history: Vec::new(),
                },
                Character {
                    id: "default_aoi".to_string(),
                    name: "葵".to_string(),
                    avatar: STARTER_AVATAR_PNG.to_string(),
                    description: "物静かで読書が好きな女の子。美術部に所属していて、\
                                  風景画を描くのが得意。猫が好きで、近所の野良猫とよく\
                                  遊んでいる。優しい心の持ち主。"
                        .to_string(),
                    chat_history: Vec::new(),
                },
            ],
            api_key: None,
        }
    }
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_info_annotation() {
        let plain = WordInfo::plain("は");
        assert!(!plain.is_annotated());

        let annotated = WordInfo::annotated("天気", "てんき", "空の様子のこと");
        assert!(annotated.is_annotated());
    }

    #[test]
    fn test_message_content_wire_format() {
        let text = MessageContent::Text(vec![WordInfo::plain("こんにちは")]);
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"][0]["word"], "こんにちは");
        assert_eq!(json["content"][0]["reading"], serde_json::Value::Null);

        let image = MessageContent::Image("YWJj".to_string());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["content"], "YWJj");
    }

    #[test]
    fn test_message_wire_format() {
        let mut msg = Message::user_text("こんにちは");
        msg.correction = Some(Correction {
            is_correct: false,
            feedback: "惜しい！".to_string(),
            corrected_text: "こんにちは！".to_string(),
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "user");
        assert_eq!(json["correction"]["isCorrect"], false);
        assert_eq!(json["correction"]["correctedText"], "こんにちは！");
    }

    #[test]
    fn test_plain_text_collapses_images() {
        let msg = Message::user(vec![
            MessageContent::Image("YWJj".to_string()),
            MessageContent::Text(vec![WordInfo::plain("見て"), WordInfo::plain("！")]),
        ]);
        assert_eq!(msg.plain_text(), "[IMAGE] 見て！");
    }

    #[test]
    fn test_recency_key() {
        let mut character = Character {
            id: "char_1700000000000".to_string(),
            name: "テスト".to_string(),
            avatar: String::new(),
            description: String::new(),
            chat_history: Vec::new(),
        };

        // No messages: falls back to the id-embedded creation time.
        assert_eq!(character.recency_key(), 1_700_000_000_000);

        // With messages: last message timestamp wins.
        let mut msg = Message::user_text("hi");
        msg.timestamp = 1_800_000_000_000;
        character.chat_history.push(msg);
        assert_eq!(character.recency_key(), 1_800_000_000_000);

        // Non-numeric id segment falls back to 0.
        let kenta = Character {
            id: "default_kenta".to_string(),
            name: "健太".to_string(),
            avatar: String::new(),
            description: String::new(),
            chat_history: Vec::new(),
        };
        assert_eq!(kenta.recency_key(), 0);
    }

    #[test]
    fn test_app_data_round_trip() {
        let data = AppData::starter();
        let json = serde_json::to_string(&data).unwrap();
        let restored: AppData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, restored);
    }

    #[test]
    fn test_app_data_accepts_missing_fields() {
        // A structurally-close document with no apiKey still parses.
        let data: AppData = serde_json::from_str(r#"{"characters": []}"#).unwrap();
        assert!(data.characters.is_empty());
        assert!(data.api_key.is_none());

        // Characters without chatHistory default to an empty history.
        let data: AppData = serde_json::from_str(
            r#"{"characters": [{"id": "c1", "name": "n", "avatar": "", "description": "d"}]}"#,
        )
        .unwrap();
        assert!(data.characters[0].chat_history.is_empty());
    }
}
