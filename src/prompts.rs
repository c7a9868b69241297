//! Prompts for the narration-enhancement step.
//!
//! Callers can override the user prompt via
//! [`crate::config::NarratorConfig::enhance_prompt`]; the constants here are
//! used only when no override is provided.

/// System message sent ahead of every enhancement request.
pub const ENHANCE_SYSTEM_PROMPT: &str = "You are an AI expert in enhancing markdown content for audio narration. \
Reply with the enhanced markdown only, without commentary and without wrapping it in code fences.";

/// Default user prompt. `{markdown}` is replaced with the document text.
pub const DEFAULT_ENHANCE_PROMPT: &str = r#"Improve the narrative quality of the markdown below so it makes an engaging audio experience:

- Add emotion to the text where appropriate.
- Reformat content as dialogue where it fits, with clear speaker turns.
- Fix formatting issues that would hinder the audio rendition (tables, footnote markers, stray symbols, broken lines).
- Add narrative details that help a listener, such as short scene descriptions or character reactions.

Keep the original meaning and language of the document.

Markdown content:
"""
{markdown}
"""

Return the enhanced markdown content."#;

/// Fill the `{markdown}` placeholder of `template` (or the default prompt).
pub fn enhance_prompt(template: Option<&str>, markdown: &str) -> String {
    template
        .unwrap_or(DEFAULT_ENHANCE_PROMPT)
        .replace("{markdown}", markdown)
}
