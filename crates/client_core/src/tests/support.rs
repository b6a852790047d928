use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::StatusCode;
use shared::protocol::GenerateExcuseRequest;
use tokio::sync::{oneshot, Mutex};

use crate::backend::{BackendResponse, GenerationBackend};

pub(crate) enum ScriptedChunk {
    Data(Bytes),
    Fail(String),
    /// Holds the body open until the sender fires (or is dropped).
    Wait(oneshot::Receiver<()>),
}

impl ScriptedChunk {
    pub(crate) fn text(fragment: &str) -> Self {
        Self::Data(Bytes::copy_from_slice(fragment.as_bytes()))
    }
}

/// In-memory backend replaying a fixed body script.
pub(crate) struct ScriptedBackend {
    status: StatusCode,
    has_body: bool,
    unreachable: Option<String>,
    chunks: Mutex<Option<Vec<ScriptedChunk>>>,
    requests: Mutex<Vec<GenerateExcuseRequest>>,
    body_polled: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub(crate) fn from_chunks(chunks: Vec<ScriptedChunk>) -> Self {
        Self {
            status: StatusCode::OK,
            has_body: true,
            unreachable: None,
            chunks: Mutex::new(Some(chunks)),
            requests: Mutex::new(Vec::new()),
            body_polled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn streaming(fragments: &[&str]) -> Self {
        Self::from_chunks(fragments.iter().map(|f| ScriptedChunk::text(f)).collect())
    }

    pub(crate) fn from_bytes(chunks: Vec<Vec<u8>>) -> Self {
        Self::from_chunks(
            chunks
                .into_iter()
                .map(|chunk| ScriptedChunk::Data(Bytes::from(chunk)))
                .collect(),
        )
    }

    pub(crate) fn unreachable(reason: &str) -> Self {
        let mut backend = Self::from_chunks(Vec::new());
        backend.unreachable = Some(reason.to_string());
        backend
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn without_body(mut self) -> Self {
        self.has_body = false;
        self
    }

    pub(crate) async fn requests(&self) -> Vec<GenerateExcuseRequest> {
        self.requests.lock().await.clone()
    }

    pub(crate) fn body_polled(&self) -> bool {
        self.body_polled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn send(&self, request: &GenerateExcuseRequest) -> Result<BackendResponse> {
        self.requests.lock().await.push(request.clone());
        if let Some(reason) = &self.unreachable {
            return Err(anyhow!(reason.clone()));
        }
        if !self.has_body {
            return Ok(BackendResponse::new(self.status, None));
        }

        let chunks = self.chunks.lock().await.take().unwrap_or_default();
        let polled = Arc::clone(&self.body_polled);
        let body = stream::iter(chunks)
            .filter_map(|chunk| async move {
                match chunk {
                    ScriptedChunk::Data(bytes) => Some(Ok(bytes)),
                    ScriptedChunk::Fail(reason) => Some(Err(anyhow!(reason))),
                    ScriptedChunk::Wait(gate) => {
                        let _ = gate.await;
                        None
                    }
                }
            })
            .inspect(move |_| polled.store(true, Ordering::SeqCst))
            .boxed();
        Ok(BackendResponse::new(self.status, Some(body)))
    }
}
