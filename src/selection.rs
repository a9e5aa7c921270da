use serde::{Deserialize, Serialize};

use crate::types::{PromptRequest, SelectionContext};

/// Where the active prompt comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTab {
    #[default]
    Saved,
    Free,
}

/// A prompt stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub id: String,
    pub label: String,
    pub prompt: String,
}

/// Model and prompt selection feeding caption requests.
///
/// Owns the state the batch queue only ever reads through a
/// [`SelectionContext`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub model: String,
    pub default_model: String,
    pub prompts: Vec<SavedPrompt>,
    pub selected_prompt_id: String,
    pub tab: PromptTab,
    pub free_text: String,
}

impl Selection {
    pub fn new(default_model: impl Into<String>) -> Self {
        let default_model = default_model.into();
        Self {
            model: default_model.clone(),
            default_model,
            ..Default::default()
        }
    }

    pub fn selected_prompt(&self) -> Option<&SavedPrompt> {
        self.prompts
            .iter()
            .find(|p| p.id == self.selected_prompt_id)
    }

    /// Prompt text for the active tab, untrimmed.
    pub fn resolved_prompt_text(&self) -> &str {
        match self.tab {
            PromptTab::Free => &self.free_text,
            PromptTab::Saved => self
                .selected_prompt()
                .map(|p| p.prompt.as_str())
                .unwrap_or(""),
        }
    }

    pub fn has_prompt_text(&self) -> bool {
        !self.resolved_prompt_text().trim().is_empty()
    }

    pub fn has_model(&self) -> bool {
        !self.model.trim().is_empty()
    }

    /// The prompt as it should be sent. Carries an id only for a selected saved prompt.
    pub fn prompt_request(&self) -> PromptRequest {
        let text = self.resolved_prompt_text().trim().to_string();
        match self.tab {
            PromptTab::Saved if !self.selected_prompt_id.is_empty() => PromptRequest {
                text,
                prompt_id: Some(self.selected_prompt_id.clone()),
            },
            _ => PromptRequest::free(text),
        }
    }

    /// Snapshot for a batch run.
    pub fn context(&self, generating: bool) -> SelectionContext {
        SelectionContext::new(self.model.trim(), self.prompt_request()).with_generating(generating)
    }

    /// Reconcile the selected model with a freshly loaded model list.
    ///
    /// The current model survives if listed; otherwise the default model is
    /// used when listed, else the first entry. An empty list clears the model.
    pub fn apply_models(&mut self, models: &[String]) {
        if models.is_empty() {
            self.model.clear();
            return;
        }
        if !self.model.is_empty() && models.contains(&self.model) {
            return;
        }
        self.model = if models.contains(&self.default_model) {
            self.default_model.clone()
        } else {
            models[0].clone()
        };
    }

    /// Replace the saved prompts and reconcile the selection.
    pub fn apply_prompts(&mut self, prompts: Vec<SavedPrompt>) {
        self.prompts = prompts;

        match self.prompts.first() {
            Some(first) => {
                if self.selected_prompt().is_none() {
                    self.selected_prompt_id = first.id.clone();
                }
                if self.tab == PromptTab::Free && self.free_text.is_empty() {
                    self.tab = PromptTab::Saved;
                }
            }
            None => {
                self.selected_prompt_id.clear();
                if self.tab == PromptTab::Saved {
                    self.tab = PromptTab::Free;
                }
            }
        }
    }

    /// Add a newly created prompt and make it the active one.
    pub fn add_prompt(&mut self, prompt: SavedPrompt) {
        self.selected_prompt_id = prompt.id.clone();
        self.prompts.push(prompt);
        self.tab = PromptTab::Saved;
    }
}
