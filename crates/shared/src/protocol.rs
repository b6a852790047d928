use serde::{Deserialize, Serialize};

/// Path of the generation endpoint, relative to the server root.
pub const GENERATE_EXCUSE_PATH: &str = "/api/generateExcuse";

/// Body of `POST /api/generateExcuse`. The response is a chunked stream of plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateExcuseRequest {
    pub prompt: String,
}

impl GenerateExcuseRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}
