#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use caption_batch::*;
use tokio::sync::{watch, Notify};

/// Scripted outcome for one file name.
#[derive(Clone)]
pub enum Script {
    Caption(String),
    Fail(String),
    Panic(String),
}

/// Backend returning scripted outcomes, recording call order and concurrency.
///
/// Files without a script get `"caption for <name>"`.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: HashMap<String, Script>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    observer: Option<watch::Receiver<QueueSnapshot>>,
    observed: Mutex<Vec<QueueSnapshot>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Record the queue state seen at the start of every call.
    pub fn observing(mut self, rx: watch::Receiver<QueueSnapshot>) -> Self {
        self.observer = Some(rx);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn observed(&self) -> Vec<QueueSnapshot> {
        self.observed.lock().unwrap().clone()
    }
}

impl CaptionBackend for ScriptedBackend {
    async fn caption(
        &self,
        file: &ImageFile,
        _prompt: &PromptRequest,
        _model: &str,
    ) -> caption_batch::Result<String> {
        if let Some(rx) = &self.observer {
            let snap = rx.borrow().clone();
            self.observed.lock().unwrap().push(snap);
        }
        self.calls.lock().unwrap().push(file.name().to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripts.get(file.name()) {
            Some(Script::Caption(text)) => Ok(text.clone()),
            Some(Script::Fail(message)) => Err(CaptionError::Transport {
                status: Some(500),
                message: message.clone(),
            }),
            Some(Script::Panic(message)) => panic!("{}", message),
            None => Ok(format!("caption for {}", file.name())),
        }
    }
}

/// Backend that blocks every call until the test releases it.
#[derive(Default)]
pub struct GatedBackend {
    pub entered: Notify,
    pub release: Notify,
}

impl CaptionBackend for GatedBackend {
    async fn caption(
        &self,
        file: &ImageFile,
        _prompt: &PromptRequest,
        _model: &str,
    ) -> caption_batch::Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(format!("caption for {}", file.name()))
    }
}

/// Backend that panics for one file before it builds its future.
pub struct EagerPanicBackend {
    pub panics_on: String,
}

impl CaptionBackend for EagerPanicBackend {
    fn caption(
        &self,
        file: &ImageFile,
        _prompt: &PromptRequest,
        _model: &str,
    ) -> impl std::future::Future<Output = caption_batch::Result<String>> + Send {
        if file.name() == self.panics_on {
            panic!("rejected {} up front", file.name());
        }
        let name = file.name().to_string();
        async move { Ok(format!("caption for {}", name)) }
    }
}

pub fn files(names: &[&str]) -> Vec<ImageFile> {
    names
        .iter()
        .map(|n| ImageFile::new(*n, n.as_bytes().to_vec()))
        .collect()
}

pub fn ctx(prompt: &str, model: &str) -> SelectionContext {
    SelectionContext::new(model, PromptRequest::free(prompt))
}
