//! Form controller: input state, validation and the single-submission gate.

use std::sync::Arc;

use futures::StreamExt;
use shared::{
    domain::{ExcuseCategory, MIN_INPUT_CHARS},
    error::ExcuseError,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    backend::{GenerationBackend, HttpGenerationBackend},
    config::ClientSettings,
    prompt::RequestPrompt,
    stream::{GeneratedText, StreamConsumer},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    /// Request sent, waiting for the response status.
    InFlight,
    /// Status accepted, body being read.
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormState {
    pub input_text: String,
    pub category: ExcuseCategory,
    /// Set for exactly as long as a generation is in flight.
    pub is_locked: bool,
    /// Set by a failed validation, cleared by the next successful one.
    pub is_invalid: bool,
    pub phase: RequestPhase,
}

impl FormState {
    pub fn input_chars(&self) -> usize {
        self.input_text.chars().count()
    }

    /// Loading indicator signal. Follows the lock, not the validation flag.
    pub fn is_loading(&self) -> bool {
        self.is_locked
    }
}

pub struct FormController {
    form: watch::Sender<FormState>,
    consumer: StreamConsumer,
}

impl FormController {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Arc<Self> {
        let (form, _) = watch::channel(FormState::default());
        Arc::new(Self {
            form,
            consumer: StreamConsumer::new(backend),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Arc<Self>> {
        let backend = HttpGenerationBackend::new(&settings.server_url, &settings.endpoint_path)?;
        info!(endpoint = %backend.endpoint(), "form: generation backend configured");
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn form_state(&self) -> FormState {
        self.form.borrow().clone()
    }

    pub fn generated_text(&self) -> GeneratedText {
        self.consumer.generated_text()
    }

    pub fn subscribe_form(&self) -> watch::Receiver<FormState> {
        self.form.subscribe()
    }

    pub fn subscribe_text(&self) -> watch::Receiver<GeneratedText> {
        self.consumer.subscribe_text()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.consumer.subscribe_events()
    }

    pub fn update_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.form.send_modify(|state| state.input_text = text);
    }

    pub fn update_category(&self, category: ExcuseCategory) {
        self.form.send_if_modified(|state| {
            if state.category == category {
                return false;
            }
            state.category = category;
            true
        });
    }

    /// Validates the input and, if it passes, runs one generation to completion.
    ///
    /// Returns `Busy` without touching any state while another submission holds the lock.
    /// The form is unlocked again whatever the outcome.
    pub async fn submit(&self) -> Result<(), ExcuseError> {
        let prompt = self.lock_for_submission()?;
        let _unlock = UnlockOnDrop { form: &self.form };

        let Some(body) = self.consumer.request(&prompt).await? else {
            return Ok(());
        };
        self.form
            .send_modify(|state| state.phase = RequestPhase::Streaming);

        let mut fragments = self.consumer.fragments(body);
        while let Some(fragment) = fragments.next().await {
            fragment?;
        }
        info!(
            category = %prompt.category(),
            chars = self.consumer.generated_text().as_str().chars().count(),
            "form: generation complete"
        );
        Ok(())
    }

    fn lock_for_submission(&self) -> Result<RequestPrompt, ExcuseError> {
        let mut outcome = Err(ExcuseError::Busy);
        self.form.send_if_modified(|state| {
            if state.is_locked {
                return false;
            }
            let actual = state.input_chars();
            if actual < MIN_INPUT_CHARS {
                outcome = Err(ExcuseError::Validation {
                    min: MIN_INPUT_CHARS,
                    actual,
                });
                state.is_invalid = true;
                return true;
            }
            state.is_invalid = false;
            state.is_locked = true;
            state.phase = RequestPhase::InFlight;
            outcome = Ok(RequestPrompt::build(&state.input_text, state.category));
            true
        });

        match &outcome {
            Ok(prompt) => debug!(category = %prompt.category(), "form: locked for submission"),
            Err(ExcuseError::Busy) => warn!("form: submit ignored while a generation is in flight"),
            Err(err) => debug!("form: validation failed: {err}"),
        }
        outcome
    }
}

struct UnlockOnDrop<'a> {
    form: &'a watch::Sender<FormState>,
}

impl Drop for UnlockOnDrop<'_> {
    fn drop(&mut self) {
        self.form.send_modify(|state| {
            state.is_locked = false;
            state.phase = RequestPhase::Idle;
        });
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
