//! Engine for a Japanese language-learning chat companion.
//!
//! This crate provides:
//! - A roster of AI conversation partners with persistent chat history
//! - A turn engine with grammar corrections and vocabulary glosses
//! - AI-assisted character creation (persona text and avatar images)
//! - Single-document JSON persistence with export and import
//!
//! # Quick Start
//!
//! ```ignore
//! use kotoba_core::{Conversation, GeminiGateway, Registry, Store, TurnConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::new("kotoba.json");
//!     let mut registry = Registry::open(store).await;
//!     let gateway = GeminiGateway::new(std::env::var("GEMINI_API_KEY").unwrap_or_default());
//!
//!     let character = registry.list_by_recency()[0].clone();
//!     let mut conversation = Conversation::open(&character.id, &character.chat_history);
//!
//!     conversation.compose_text("こんにちは！元気ですか？")?;
//!     let summary = conversation
//!         .submit_turn(&gateway, &mut registry, &TurnConfig::default())
//!         .await?;
//!     println!("{} replies", summary.replies);
//!     Ok(())
//! }
//! ```

pub mod creator;
pub mod gateway;
pub mod media;
pub mod model;
pub mod prompts;
pub mod registry;
pub mod store;
pub mod testing;
pub mod turn;

// Primary public API
pub use creator::{CharacterDraft, DraftError};
pub use gateway::{ChatGateway, GatewayError, GeminiGateway, ResponseItem, TurnCorrection, TurnReply};
pub use media::{read_image_base64, EncodedImage, MediaError};
pub use model::{AppData, Character, Correction, Message, MessageContent, Sender, WordInfo};
pub use registry::Registry;
pub use store::{Store, StoreError};
pub use testing::MockGateway;
pub use turn::{Conversation, TurnConfig, TurnError, TurnState, TurnSummary};
