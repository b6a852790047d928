//! Stream consumer: issues a generation request and turns its body into text fragments.

use std::{fmt, sync::Arc};

use futures::{
    future,
    stream::{self, BoxStream},
    StreamExt,
};
use shared::{error::ExcuseError, protocol::GenerateExcuseRequest};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    backend::{ByteStream, GenerationBackend},
    decoder::Utf8StreamDecoder,
    prompt::RequestPrompt,
    ClientEvent,
};

const EVENT_BUFFER: usize = 1024;

pub type FragmentStream = BoxStream<'static, Result<String, ExcuseError>>;

/// Text produced by the current (or most recent) generation, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    fragments: Vec<String>,
    text: String,
    finished: bool,
}

impl GeneratedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True once the stream ended, normally or not. No fragment is appended afterwards.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Appends `fragment` unless the text is already finished.
    fn push(&mut self, fragment: &str) -> bool {
        if self.finished {
            return false;
        }
        self.text.push_str(fragment);
        self.fragments.push(fragment.to_string());
        true
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl fmt::Display for GeneratedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Clone)]
pub struct StreamConsumer {
    backend: Arc<dyn GenerationBackend>,
    generated: Arc<watch::Sender<GeneratedText>>,
    events: broadcast::Sender<ClientEvent>,
}

impl StreamConsumer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let (generated, _) = watch::channel(GeneratedText::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            backend,
            generated: Arc::new(generated),
            events,
        }
    }

    pub fn generated_text(&self) -> GeneratedText {
        self.generated.borrow().clone()
    }

    pub fn subscribe_text(&self) -> watch::Receiver<GeneratedText> {
        self.generated.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Lazily requests a generation and yields decoded fragments as they arrive.
    ///
    /// Nothing is sent until the stream is first polled. Every fragment is already part of
    /// [`GeneratedText`] by the time it is yielded. A failure is yielded once, as the last
    /// item.
    pub fn generate(&self, prompt: RequestPrompt) -> FragmentStream {
        let consumer = self.clone();
        stream::once(async move {
            match consumer.request(&prompt).await {
                Ok(Some(body)) => consumer.fragments(body),
                Ok(None) => stream::empty().boxed(),
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            }
        })
        .flatten()
        .boxed()
    }

    /// Drives [`generate`](Self::generate) to completion.
    pub async fn run(&self, prompt: RequestPrompt) -> Result<GeneratedText, ExcuseError> {
        let mut fragments = self.generate(prompt);
        while let Some(fragment) = fragments.next().await {
            fragment?;
        }
        Ok(self.generated_text())
    }

    /// Clears the output and sends the request. Returns the unread body on success, or
    /// `None` when the response has no body (the generation is then already finished).
    pub(crate) async fn request(&self, prompt: &RequestPrompt) -> Result<Option<ByteStream>, ExcuseError> {
        self.generated.send_replace(GeneratedText::default());
        let _ = self.events.send(ClientEvent::GenerationStarted {
            category: prompt.category(),
        });

        let request = GenerateExcuseRequest::from(prompt);
        let response = match self.backend.send(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    category = %prompt.category(),
                    "generate: request could not be completed: {err:#}"
                );
                return Err(self.fail(ExcuseError::request_failed(format!("{err:#}"))));
            }
        };

        if !response.status.is_success() {
            warn!(
                category = %prompt.category(),
                status = response.status.as_u16(),
                "generate: backend rejected request"
            );
            return Err(self.fail(ExcuseError::request_failed(response.status.to_string())));
        }

        match response.body {
            Some(body) => {
                info!(category = %prompt.category(), "generate: streaming response");
                Ok(Some(body))
            }
            None => {
                info!(
                    category = %prompt.category(),
                    "generate: response has no body; nothing to stream"
                );
                self.finish();
                Ok(None)
            }
        }
    }

    /// Decodes `body` chunk by chunk, appending each fragment to [`GeneratedText`].
    ///
    /// Once the text is finished it stays frozen: a body still being read at that point
    /// ends with `StreamReadFailed` and nothing more is appended.
    pub(crate) fn fragments(&self, body: ByteStream) -> FragmentStream {
        let reader = FragmentReader {
            consumer: self.clone(),
            body,
            decoder: Utf8StreamDecoder::new(),
            done: false,
        };
        stream::unfold(reader, |mut reader| async move {
            reader.next().await.map(|item| (item, reader))
        })
        .boxed()
    }

    fn append(&self, fragment: &str) -> bool {
        if !self.generated.send_if_modified(|text| text.push(fragment)) {
            return false;
        }
        let _ = self
            .events
            .send(ClientEvent::FragmentAppended(fragment.to_string()));
        true
    }

    fn finish(&self) {
        let mut fragments = 0;
        self.generated.send_modify(|text| {
            text.finish();
            fragments = text.fragments().len();
        });
        debug!(fragments, "generate: stream exhausted");
        let _ = self
            .events
            .send(ClientEvent::GenerationFinished { fragments });
    }

    fn fail(&self, err: ExcuseError) -> ExcuseError {
        self.generated.send_modify(GeneratedText::finish);
        let _ = self.events.send(ClientEvent::GenerationFailed(err.clone()));
        err
    }
}

struct FragmentReader {
    consumer: StreamConsumer,
    body: ByteStream,
    decoder: Utf8StreamDecoder,
    done: bool,
}

impl FragmentReader {
    async fn next(&mut self) -> Option<Result<String, ExcuseError>> {
        if self.done {
            return None;
        }
        loop {
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    let fragment = self.decoder.decode(&chunk);
                    if fragment.is_empty() {
                        continue;
                    }
                    if !self.consumer.append(&fragment) {
                        return Some(Err(self.rejected()));
                    }
                    return Some(Ok(fragment));
                }
                Some(Err(err)) => {
                    self.done = true;
                    let kept = self.consumer.generated.borrow().as_str().len();
                    warn!(kept_bytes = kept, "generate: body read failed: {err:#}");
                    let err = ExcuseError::stream_read_failed(format!("{err:#}"));
                    return Some(Err(self.consumer.fail(err)));
                }
                None => {
                    self.done = true;
                    if self.consumer.generated.borrow().is_finished() {
                        return None;
                    }
                    if self.decoder.has_pending() {
                        debug!("generate: body ended inside a multi-byte sequence");
                    }
                    let tail = self.decoder.finish();
                    if !tail.is_empty() && !self.consumer.append(&tail) {
                        return Some(Err(self.rejected()));
                    }
                    self.consumer.finish();
                    return (!tail.is_empty()).then_some(Ok(tail));
                }
            }
        }
    }

    fn rejected(&mut self) -> ExcuseError {
        self.done = true;
        warn!("generate: body outlived its generation; remaining chunks dropped");
        ExcuseError::stream_read_failed("generation already finished")
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
