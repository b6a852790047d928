use shared::{domain::ExcuseCategory, protocol::GenerateExcuseRequest};

/// Prompt sent to the generation endpoint, derived from the form at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPrompt {
    text: String,
    category: ExcuseCategory,
}

impl RequestPrompt {
    pub fn build(input_text: &str, category: ExcuseCategory) -> Self {
        let text = format!(
            "Generate one excuse for \"{input_text}\". Make sure each generated excuse is at least 6 words and at max 20 words and base them on this context: {}",
            category.key()
        );
        Self { text, category }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> ExcuseCategory {
        self.category
    }
}

impl From<&RequestPrompt> for GenerateExcuseRequest {
    fn from(prompt: &RequestPrompt) -> Self {
        GenerateExcuseRequest::new(prompt.text.clone())
    }
}
