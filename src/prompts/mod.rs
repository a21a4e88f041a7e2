//! Prompt templates for every classification and writer step.
//!
//! Each template is a text body (loaded from the prompts directory or a
//! built-in default) followed by a fixed suffix that carries the input
//! placeholders. Body text is always taken literally; only the suffix is
//! rendered, so braces inside a prompt file never act as placeholders.

mod defaults;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::error::{ConfigError, TriageError};

/// Preamble some prompt files carry from being generated by a model.
const META_PREAMBLE: &str = "Below is your revised prompt file";

/// Appended to every schema-bound prompt.
const JSON_INSTRUCTION: &str = "Provide the output in JSON format.";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// The eight templates the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateKey {
    Summarizer,
    NeedsResponse,
    Categorizer,
    MeetingRequestDecider,
    Editor,
    DeclineWriter,
    ScheduleWriter,
    GeneralWriter,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 8] = [
        Self::Summarizer,
        Self::NeedsResponse,
        Self::Categorizer,
        Self::MeetingRequestDecider,
        Self::Editor,
        Self::DeclineWriter,
        Self::ScheduleWriter,
        Self::GeneralWriter,
    ];

    /// Short name for logging and request tagging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Summarizer => "summarizer",
            Self::NeedsResponse => "needs_response",
            Self::Categorizer => "categorizer",
            Self::MeetingRequestDecider => "meeting_request_decider",
            Self::Editor => "editor",
            Self::DeclineWriter => "decline_writer",
            Self::ScheduleWriter => "schedule_writer",
            Self::GeneralWriter => "general_writer",
        }
    }

    /// File name inside the prompts directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Summarizer => "email_summarizer_prompt.txt",
            Self::NeedsResponse => "email_needs_response_prompt.txt",
            Self::Categorizer => "email_categorizer_prompt.txt",
            Self::MeetingRequestDecider => "meeting_request_decider_prompt.txt",
            Self::Editor => "email_editor_agent_prompt.txt",
            Self::DeclineWriter => "decline_writer_prompt.txt",
            Self::ScheduleWriter => "schedule_email_writer_prompt.txt",
            Self::GeneralWriter => "email_writer_prompt.txt",
        }
    }

    /// Input variables the template declares.
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Self::NeedsResponse => &["summary"],
            Self::Editor => &["draft_email", "edited_email"],
            _ => &["email_content"],
        }
    }

    /// Whether the output is parsed into a structured schema.
    pub fn is_schema_bound(self) -> bool {
        !matches!(
            self,
            Self::DeclineWriter | Self::ScheduleWriter | Self::GeneralWriter
        )
    }

    /// Suffix block with the literal placeholders.
    fn suffix(self) -> &'static str {
        match self {
            Self::NeedsResponse => "Email summary: {summary}",
            Self::Editor => "Draft email: {draft_email}\nEdited email: {edited_email}",
            _ => "Email content: {email_content}",
        }
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Named inputs for one template render.
#[derive(Debug, Clone, Default)]
pub struct TemplateInputs {
    values: BTreeMap<&'static str, String>,
}

impl TemplateInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// The loaded template set.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    bodies: HashMap<TemplateKey, String>,
}

impl PromptLibrary {
    /// Library made entirely of built-in bodies.
    pub fn builtin() -> Self {
        let bodies = TemplateKey::ALL
            .iter()
            .map(|&key| (key, defaults::default_body(key).to_string()))
            .collect();
        Self { bodies }
    }

    /// Load bodies from `dir`, falling back to built-ins for missing files.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut library = Self::builtin();
        let mut loaded = 0usize;

        for key in TemplateKey::ALL {
            let path = dir.join(key.file_name());
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    library.bodies.insert(key, clean_prompt(&text));
                    loaded += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(template = key.name(), path = %path.display(), "Prompt file missing, using built-in");
                }
                Err(e) => return Err(ConfigError::Io(e)),
            }
        }

        info!(dir = %dir.display(), loaded, "Prompt library loaded");
        Ok(library)
    }

    /// Override one body (used by tests and callers with inline prompts).
    pub fn with_body(mut self, key: TemplateKey, body: impl Into<String>) -> Self {
        self.bodies.insert(key, body.into());
        self
    }

    /// Body text for a key.
    pub fn body(&self, key: TemplateKey) -> &str {
        self.bodies
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| defaults::default_body(key))
    }

    /// Render the full prompt for `key` with `inputs`.
    pub fn render(&self, key: TemplateKey, inputs: &TemplateInputs) -> Result<String, TriageError> {
        for &variable in key.variables() {
            if inputs.get(variable).is_none() {
                return Err(TriageError::Template {
                    template: key.name(),
                    variable,
                });
            }
        }

        let suffix = PLACEHOLDER.replace_all(key.suffix(), |caps: &Captures| {
            inputs.get(&caps[1]).unwrap_or_default().to_string()
        });

        let mut prompt = String::with_capacity(self.body(key).len() + suffix.len() + 64);
        prompt.push_str(self.body(key));
        prompt.push_str("\n\n");
        prompt.push_str(&suffix);
        if key.is_schema_bound() {
            prompt.push_str("\n\n");
            prompt.push_str(JSON_INSTRUCTION);
        }
        Ok(prompt)
    }
}

/// Drop a generated meta preamble up to the first `Role:` line.
fn clean_prompt(text: &str) -> String {
    if text.starts_with(META_PREAMBLE)
        && let Some(idx) = text.find("Role:")
    {
        return text[idx..].to_string();
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_placeholders_match_declared_variables() {
        for key in TemplateKey::ALL {
            let found: Vec<&str> = PLACEHOLDER
                .captures_iter(key.suffix())
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            assert_eq!(found, key.variables(), "template {key}");
        }
    }

    #[test]
    fn writers_are_free_text() {
        assert!(!TemplateKey::DeclineWriter.is_schema_bound());
        assert!(!TemplateKey::ScheduleWriter.is_schema_bound());
        assert!(!TemplateKey::GeneralWriter.is_schema_bound());
        assert!(TemplateKey::Editor.is_schema_bound());
    }

    #[test]
    fn render_substitutes_and_appends_json_instruction() {
        let library = PromptLibrary::builtin().with_body(TemplateKey::Summarizer, "Summarize.");
        let inputs = TemplateInputs::new().with("email_content", r#"{"subject":"Hi"}"#);
        let prompt = library.render(TemplateKey::Summarizer, &inputs).unwrap();
        assert_eq!(
            prompt,
            "Summarize.\n\nEmail content: {\"subject\":\"Hi\"}\n\nProvide the output in JSON format."
        );
    }

    #[test]
    fn render_writer_has_no_json_instruction() {
        let library = PromptLibrary::builtin();
        let inputs = TemplateInputs::new().with("email_content", "hello");
        let prompt = library.render(TemplateKey::GeneralWriter, &inputs).unwrap();
        assert!(prompt.ends_with("Email content: hello"));
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_values() {
        let library = PromptLibrary::builtin().with_body(TemplateKey::Editor, "Compare.");
        let inputs = TemplateInputs::new()
            .with("draft_email", "uses {edited_email} literally")
            .with("edited_email", "final");
        let prompt = library.render(TemplateKey::Editor, &inputs).unwrap();
        assert!(prompt.contains("Draft email: uses {edited_email} literally\nEdited email: final"));
    }

    #[test]
    fn render_body_braces_are_literal() {
        let library =
            PromptLibrary::builtin().with_body(TemplateKey::Categorizer, r#"Answer {"decision": ...}"#);
        let inputs = TemplateInputs::new().with("email_content", "x");
        let prompt = library.render(TemplateKey::Categorizer, &inputs).unwrap();
        assert!(prompt.starts_with(r#"Answer {"decision": ...}"#));
    }

    #[test]
    fn render_missing_variable_fails() {
        let library = PromptLibrary::builtin();
        let inputs = TemplateInputs::new().with("draft_email", "x");
        let err = library.render(TemplateKey::Editor, &inputs).unwrap_err();
        assert!(matches!(
            err,
            TriageError::Template {
                template: "editor",
                variable: "edited_email"
            }
        ));
    }

    #[test]
    fn clean_prompt_strips_meta_preamble() {
        let text = "Below is your revised prompt file:\n\nRole: Writer\nDo things.";
        assert_eq!(clean_prompt(text), "Role: Writer\nDo things.");
        assert_eq!(clean_prompt("Role: Writer"), "Role: Writer");
        assert_eq!(
            clean_prompt("Below is your revised prompt file, no role"),
            "Below is your revised prompt file, no role"
        );
    }

    #[test]
    fn load_falls_back_to_builtin_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(TemplateKey::DeclineWriter.file_name()),
            "Below is your revised prompt file\nRole: Decliner",
        )
        .unwrap();

        let library = PromptLibrary::load(dir.path()).unwrap();
        assert_eq!(library.body(TemplateKey::DeclineWriter), "Role: Decliner");
        assert_eq!(
            library.body(TemplateKey::Summarizer),
            defaults::default_body(TemplateKey::Summarizer)
        );
    }
}
