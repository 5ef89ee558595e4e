//! Scripted backend for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::backend::{
    ChatBackend, ChatChunk, ChatChunkStream, ChatContext, CompletionBackend, GenerateRequest,
};
use crate::error::AiError;
use crate::types::RawCompletion;

/// Scripted chat stream.
#[derive(Debug)]
pub enum FakeStream {
    /// Chunks yielded in order; an `Err` ends the stream mid-way.
    Chunks(Vec<Result<String, AiError>>),
    /// The stream fails to open.
    OpenError(AiError),
}

/// Fake backend that replays queued answers and records what it was asked.
///
/// Both queues are FIFO. An exhausted queue answers with a transport error,
/// which is what an unreachable backend looks like to callers.
#[derive(Debug, Default)]
pub struct FakeBackend {
    completions: Mutex<VecDeque<Result<RawCompletion, AiError>>>,
    streams: Mutex<VecDeque<FakeStream>>,
    requests: Mutex<Vec<GenerateRequest>>,
    chat_calls: Mutex<Vec<(ChatContext, String)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(self, completion: RawCompletion) -> Self {
        self.push_completion(Ok(completion));
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_completion(RawCompletion::text(text))
    }

    pub fn with_error(self, error: AiError) -> Self {
        self.push_completion(Err(error));
        self
    }

    pub fn with_stream(self, chunks: &[&str]) -> Self {
        self.push_stream(FakeStream::Chunks(
            chunks.iter().map(|c| Ok(c.to_string())).collect(),
        ));
        self
    }

    pub fn with_scripted_stream(self, stream: FakeStream) -> Self {
        self.push_stream(stream);
        self
    }

    pub fn push_completion(&self, completion: Result<RawCompletion, AiError>) {
        if let Ok(mut queue) = self.completions.lock() {
            queue.push_back(completion);
        }
    }

    pub fn push_stream(&self, stream: FakeStream) {
        if let Ok(mut queue) = self.streams.lock() {
            queue.push_back(stream);
        }
    }

    /// Every completion request received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Every chat message received so far, with its context.
    pub fn chat_calls(&self) -> Vec<(ChatContext, String)> {
        self.chat_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<RawCompletion, AiError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.completions
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(AiError::transport("no scripted completion")))
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn stream_chat(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatChunkStream, AiError> {
        if let Ok(mut calls) = self.chat_calls.lock() {
            calls.push((context.clone(), message.to_string()));
        }
        let scripted = self
            .streams
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| FakeStream::OpenError(AiError::transport("no scripted stream")));

        match scripted {
            FakeStream::OpenError(error) => Err(error),
            FakeStream::Chunks(chunks) => {
                let items = chunks.into_iter().map(|c| c.map(ChatChunk::text));
                Ok(Box::pin(futures::stream::iter(items)))
            }
        }
    }
}
