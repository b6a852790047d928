//! Client core for the excuse generator: form state, request lifecycle and incremental
//! consumption of the streamed generation response.

use shared::{domain::ExcuseCategory, error::ExcuseError};

pub mod backend;
pub mod config;
pub mod decoder;
pub mod form;
pub mod prompt;
pub mod stream;

pub use backend::{BackendResponse, ByteStream, GenerationBackend, HttpGenerationBackend};
pub use config::{load_settings, ClientSettings};
pub use decoder::Utf8StreamDecoder;
pub use form::{FormController, FormState, RequestPhase};
pub use prompt::RequestPrompt;
pub use stream::{FragmentStream, GeneratedText, StreamConsumer};

/// Lifecycle notifications published while a generation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    GenerationStarted { category: ExcuseCategory },
    FragmentAppended(String),
    GenerationFinished { fragments: usize },
    GenerationFailed(ExcuseError),
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
