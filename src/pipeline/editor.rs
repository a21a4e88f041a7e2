//! Edit-Diff: structured comparison of a draft and its human edit.

use std::sync::Arc;

use tracing::{debug, info};

use crate::classify::{Classifier, EditAnalysis};
use crate::error::TriageError;
use crate::prompts::{TemplateInputs, TemplateKey};

/// Runs the editor template over a (draft, edited) pair.
#[derive(Clone)]
pub struct EditDiff {
    classifier: Arc<Classifier>,
}

impl EditDiff {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }

    /// One classifier call; no checkpoint, no side effects.
    pub async fn diff(&self, draft: &str, edited: &str) -> Result<EditAnalysis, TriageError> {
        info!("Analyzing edits");
        let inputs = TemplateInputs::new()
            .with("draft_email", draft)
            .with("edited_email", edited);
        let analysis: EditAnalysis = self.classifier.classify(TemplateKey::Editor, &inputs).await?;
        debug!(changes = analysis.changes.len(), "Edit analysis complete");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifierConfig;
    use crate::prompts::PromptLibrary;
    use crate::testing::ScriptedLlm;

    const ANALYSIS: &str = r#"{
        "summary": "Softened the tone",
        "changes": [
            {"kind": "tone", "original": "No.", "edited": "Unfortunately not.", "rationale": "politer"}
        ],
        "learnings": ["Prefer a gentle refusal"]
    }"#;

    fn editor(llm: Arc<ScriptedLlm>) -> EditDiff {
        EditDiff::new(Arc::new(Classifier::new(
            llm,
            Arc::new(PromptLibrary::builtin()),
            ClassifierConfig::default(),
        )))
    }

    #[tokio::test]
    async fn diff_passes_both_texts() {
        let llm = Arc::new(ScriptedLlm::new().reply("editor", ANALYSIS));
        let analysis = editor(Arc::clone(&llm)).diff("No.", "Unfortunately not.").await.unwrap();

        assert_eq!(analysis.summary, "Softened the tone");
        assert_eq!(analysis.changes.len(), 1);
        let prompt = llm.last_prompt("editor").unwrap();
        assert!(prompt.contains("Draft email: No."));
        assert!(prompt.contains("Edited email: Unfortunately not."));
    }

    #[tokio::test]
    async fn diff_is_idempotent_on_deterministic_backend() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("editor", ANALYSIS)
                .reply("editor", ANALYSIS),
        );
        let editor = editor(Arc::clone(&llm));
        let first = editor.diff("No.", "Unfortunately not.").await.unwrap();
        let second = editor.diff("No.", "Unfortunately not.").await.unwrap();

        assert_eq!(first, second);
        let requests = llm.requests();
        assert_eq!(requests[0].messages, requests[1].messages);
    }
}
