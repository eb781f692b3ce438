//! Instruction documents sent with each gateway call.

use crate::model::Character;

/// Prompt for generating a character description from a short user idea.
pub fn description_prompt(idea: &str) -> String {
    format!(
        "Create a detailed and engaging character description for a Japanese \
         language learning companion based on this prompt: \"{idea}\". The \
         description should give them a distinct personality, hobbies, and a \
         backstory. The character lives in Japan. Write the description in \
         English."
    )
}

/// Prompt for generating a character avatar portrait.
pub fn avatar_prompt(description: &str) -> String {
    format!(
        "Generate an anime-style character avatar based on this description: \
         {description}. The image should be a close-up portrait with a simple \
         background."
    )
}

/// Prompt for an in-chat image, seeded with the character's avatar for
/// appearance continuity.
pub fn chat_image_prompt(image_prompt: &str) -> String {
    format!(
        "The character in the provided image is the main subject. Create a new \
         anime-style image based on this prompt: \"{image_prompt}\". The \
         character's appearance MUST be consistent with the provided image."
    )
}

/// System instruction for the structured turn call: fixes the JSON reply
/// schema, the correction policy, and the vocabulary-annotation rules.
pub fn turn_system_prompt(character: &Character) -> String {
    format!(
        r#"You are an AI character in a Japanese language learning app. Your personality is defined by: "{description}".
You are chatting with a user who is learning Japanese. Your goal is to have a natural, engaging conversation while helping them learn.

You MUST respond in a valid JSON format. Do not add any text or markdown formatting outside the JSON object. The JSON object must adhere to this exact structure:
{{
  "corrections": [
    {{
      "userMessageIndex": 0,
      "isCorrect": true,
      "feedback": "完璧！すごいね！",
      "correctedText": "ユーザーのメッセージ"
    }}
  ],
  "responses": [
    {{
      "type": "text",
      "content": [
        {{ "word": "今日", "reading": null, "meaning": null }},
        {{ "word": "は", "reading": null, "meaning": null }},
        {{ "word": "いい", "reading": null, "meaning": null }},
        {{ "word": "天気", "reading": "てんき", "meaning": "晴れとか雨とか、空の様子のこと" }},
        {{ "word": "だね", "reading": null, "meaning": null }}
      ]
    }}
  ]
}}

- For each user message in this turn, provide a corresponding object in the "corrections" array. userMessageIndex must match the message's index in the user's turn.
- Your feedback must be in VERY SIMPLE, encouraging, and almost childish Japanese.
- Your own response in "responses" should be natural and continue the conversation, in character.
- Break down EVERY Japanese word in your text response into the "content" array structure.
- For each word, determine if it is at or above the JLPT N3 level of difficulty.
- If the word is N3 or higher, you MUST provide its 'reading' (furigana) and a 'meaning' (a very simple explanation in Japanese).
- If the word is below N3 level (e.g., N4, N5, particles, hiragana-only common words), you MUST set both 'reading' and 'meaning' to null. This is very important.
- You can have multiple text response objects in the "responses" array to simulate sending several short messages.
- You can optionally include an image_prompt in "responses" to show the user something from your character's life. The prompt must be in English for an image generator.
- Example image_prompt: {{ "type": "image_prompt", "content": "A selfie of {name} with pigtails, eating a crepe in Harajuku, anime style." }}
"#,
        description = character.description,
        name = character.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppData;

    #[test]
    fn test_turn_prompt_embeds_character() {
        let data = AppData::starter();
        let kenta = &data.characters[0];

        let prompt = turn_system_prompt(kenta);
        assert!(prompt.contains(&kenta.description));
        assert!(prompt.contains("userMessageIndex"));
        assert!(prompt.contains("image_prompt"));
        assert!(prompt.contains(&kenta.name));
    }

    #[test]
    fn test_description_prompt_embeds_idea() {
        let prompt = description_prompt("a shy librarian");
        assert!(prompt.contains("a shy librarian"));
        assert!(prompt.contains("lives in Japan"));
    }
}
