/*!
 * Prompt templates for selective book translation.
 *
 * A batch is rendered as tagged input lines (`[CONTEXT] 7: ...`,
 * `[TRANSLATE] 8: ...`) and the model is asked to answer with one
 * `id: translation` line per TRANSLATE entry.
 */

use serde::{Deserialize, Serialize};

use crate::language_utils;
use crate::translation::batch::{EntryTag, TranslationBatch};

/// Number of example output lines appended to the prompt
const EXAMPLE_LINES: usize = 3;

/// System prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Default system prompt for bilingual learning books.
    pub const BILINGUAL_BOOK_TRANSLATOR: &'static str = r#"You are a professional translator helping create a bilingual learning book. The reader is learning {source_language} and reads {target_language} natively.

## Rules
1. Translate ONLY the sentences marked with [TRANSLATE], from {source_language} to {target_language}
2. Sentences marked with [CONTEXT] are for reference only; never translate or repeat them
3. Keep the exact sentence ids in your response
4. Maintain the tone, style and register of the original
5. Preserve proper nouns unless they have a well-known translation
6. Follow the punctuation conventions of {target_language}
7. Return ONLY the translations, one per line, in the exact format: "ID: translated text""#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn bilingual_book_translator() -> Self {
        Self::new(Self::BILINGUAL_BOOK_TRANSLATOR)
    }

    /// Render the template with the given language names.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::bilingual_book_translator()
    }
}

/// One tagged entry as sent to the translation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEntry {
    pub id: u64,
    pub tag: EntryTag,
    pub text: String,
}

/// Everything a provider needs to translate one batch.
///
/// `entries` carries the structured form; `system_prompt` and `prompt` are
/// the rendered text that chat-style backends send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub entries: Vec<RequestEntry>,
    pub source_language: String,
    pub target_language: String,
    pub system_prompt: String,
    pub prompt: String,
}

impl ServiceRequest {
    /// Ids the response is expected to contain
    pub fn translate_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .iter()
            .filter(|e| e.tag == EntryTag::Translate)
            .map(|e| e.id)
    }
}

/// Builds `ServiceRequest`s for batches of one language pair.
#[derive(Debug, Clone)]
pub struct BatchPromptBuilder {
    source_language: String,
    target_language: String,
    template: PromptTemplate,
    custom_instructions: Option<String>,
}

impl BatchPromptBuilder {
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            template: PromptTemplate::default(),
            custom_instructions: None,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Extra guidance appended after the rules (e.g. formality).
    pub fn with_custom_instructions(mut self, instructions: &str) -> Self {
        let trimmed = instructions.trim();
        self.custom_instructions = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn build(&self, batch: &TranslationBatch) -> ServiceRequest {
        let source_name = display_name(&self.source_language);
        let target_name = display_name(&self.target_language);

        let entries: Vec<RequestEntry> = batch
            .entries
            .iter()
            .map(|e| RequestEntry {
                id: e.reference_id,
                tag: e.tag,
                text: e.text.clone(),
            })
            .collect();

        let mut prompt = format!(
            "Translate ONLY the sentences marked with [TRANSLATE] from {} to {}.\n",
            source_name, target_name
        );
        if let Some(instructions) = &self.custom_instructions {
            prompt.push_str(instructions);
            prompt.push('\n');
        }

        prompt.push_str("\nInput:\n");
        for entry in &entries {
            prompt.push_str(&format!("[{}] {}: {}\n", entry.tag, entry.id, single_line(&entry.text)));
        }

        prompt.push_str("\nExpected output format (one line per [TRANSLATE] sentence):\n");
        let translate_ids: Vec<u64> = entries
            .iter()
            .filter(|e| e.tag == EntryTag::Translate)
            .map(|e| e.id)
            .collect();
        for id in translate_ids.iter().take(EXAMPLE_LINES) {
            prompt.push_str(&format!("{}: <{} translation>\n", id, target_name));
        }
        prompt.push_str(&format!(
            "\nReturn exactly {} line(s). Your translations:",
            translate_ids.len()
        ));

        ServiceRequest {
            entries,
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            system_prompt: self.template.render(&source_name, &target_name),
            prompt,
        }
    }
}

fn display_name(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

/// Line breaks inside a sentence would break the one-entry-per-line format.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
