//! Prompt construction for the language model.

use super::{ChatMessage, TranslationConfig};

const TRANSLATOR_SYSTEM: &str = "You are a translator. Output only valid JSON.";

/// Display name of a language code; unknown codes are returned unchanged.
pub fn language_name(code: &str) -> String {
    match code.trim().to_lowercase().as_str() {
        "ko" => "Korean".to_string(),
        "en" => "English".to_string(),
        "ja" => "Japanese".to_string(),
        "zh" => "Chinese".to_string(),
        _ => code.trim().to_string(),
    }
}

fn target_name(config: &TranslationConfig) -> String {
    let target = config.target_lang.trim().to_lowercase();
    if target == "auto" {
        "Auto (opposite language)".to_string()
    } else {
        language_name(&target)
    }
}

/// Instruction sentence and source hint for a configuration.
fn instruction(config: &TranslationConfig) -> (String, String) {
    let target_name = target_name(config);

    if config.is_polish() {
        (
            format!(
                "Polish each item in {} and improve clarity while keeping the meaning.",
                target_name
            ),
            target_name,
        )
    } else if config.source_lang.trim().eq_ignore_ascii_case("auto") {
        (
            format!(
                "Detect whether each item is Korean, English, Japanese, or Chinese and translate it into {}.",
                target_name
            ),
            "Auto-detect (ko/en/ja/zh)".to_string(),
        )
    } else {
        let source_name = language_name(&config.source_lang);
        (
            format!("Translate each item from {} to {}.", source_name, target_name),
            source_name,
        )
    }
}

/// Messages asking for a translation of `items`.
pub fn translation_messages(items: &[&str], config: &TranslationConfig) -> Vec<ChatMessage> {
    let (instruction, source_hint) = instruction(config);
    let glossary = config
        .glossary
        .as_ref()
        .map(|g| g.to_json())
        .unwrap_or_else(|| "{}".to_string());
    let source = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());

    let prompt = format!(
        "{} Keep numbers/dates/URLs/code unchanged. \
         Return only JSON with a 'result' array of translated strings matching the SOURCE order and length.\n\
         Source language hint: {}\n\
         Target language: {}\n\
         Glossary(JSON): {}\n\
         Extra Instructions: {}\n\
         SOURCE(JSON): {}",
        instruction,
        source_hint,
        target_name(config),
        glossary,
        config.extra_instructions.as_deref().unwrap_or("None"),
        source
    );

    vec![ChatMessage::system(TRANSLATOR_SYSTEM), ChatMessage::user(prompt)]
}

/// Appended after a reply that could not be decoded.
pub fn corrective_message() -> ChatMessage {
    ChatMessage::system(
        "Your previous reply was not valid JSON. Return only `{\"result\": [\"...\"]}` with the correct length.",
    )
}

/// Messages asking to shorten one line to `max_chars` characters.
pub fn shorten_messages(text: &str, max_chars: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You shorten slide text. Output only JSON of the form {\"result\": \"...\"}.",
        ),
        ChatMessage::user(format!(
            "Rewrite the text in the same language so that it has at most {} characters. \
             Keep every number, date and URL exactly as written and keep the meaning.\n\
             TEXT: {}",
            max_chars,
            serde_json::to_string(text).unwrap_or_default()
        )),
    ]
}

/// Messages asking for terminology recommendations.
pub fn preflight_messages(outline: &str, candidates_json: &str, target_lang: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a bilingual localization strategist for presentation decks. \
             Review terminology candidates, recommend consistent translations, and highlight \
             ambiguous content. Always reply with JSON only, shaped as \
             {\"terms\": [{\"source_term\": str, \"preferred_translation\": str|null, \
             \"category\": str|null, \"rationale\": str|null}], \"style_note\": str, \
             \"ambiguous_spots\": [str]}.",
        ),
        ChatMessage::user(format!(
            "Presentation outline:\n{}\n\n\
             Terminology candidates (JSON):\n{}\n\n\
             Target translation language: {}.\n\
             Return any important glossary entries with suggested translations.",
            outline,
            candidates_json,
            language_name(target_lang)
        )),
    ]
}
