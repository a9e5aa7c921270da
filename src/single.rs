use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::guard;
use crate::selection::Selection;
use crate::types::ImageFile;
use crate::CaptionBackend;

/// Single-image caption flow: one attached image, one request at a time.
#[derive(Default)]
pub struct SingleCaption {
    image: Mutex<Option<ImageFile>>,
    generating: AtomicBool,
    output: Mutex<String>,
    error: Mutex<String>,
}

/// Clears the in-flight flag when dropped.
struct GeneratingFlag<'a>(&'a AtomicBool);

impl Drop for GeneratingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lock `mutex`, recovering the value if a previous holder panicked.
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(state = what, "single caption lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl SingleCaption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, file: ImageFile) {
        *lock(&self.image, "image") = Some(file);
    }

    pub fn clear(&self) {
        *lock(&self.image, "image") = None;
    }

    pub fn image(&self) -> Option<ImageFile> {
        lock(&self.image, "image").clone()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Caption from the last successful generation.
    pub fn output(&self) -> String {
        lock(&self.output, "output").clone()
    }

    /// Message from the last failed generation.
    pub fn error(&self) -> String {
        lock(&self.error, "error").clone()
    }

    fn set_output(&self, value: String) {
        *lock(&self.output, "output") = value;
    }

    fn set_error(&self, value: String) {
        *lock(&self.error, "error") = value;
    }

    /// See [`guard::can_submit`].
    pub fn can_submit(&self, selection: &Selection, batch_running: bool) -> bool {
        guard::can_submit(
            self.image().is_some(),
            selection.resolved_prompt_text(),
            &selection.model,
            self.is_generating(),
            batch_running,
        )
    }

    /// Caption the attached image.
    ///
    /// Does nothing without an image or prompt text, or while another
    /// generation is in flight. A missing model is reported through
    /// [`error`](Self::error). Returns whether a request was sent.
    pub async fn generate<B>(&self, backend: &B, selection: &Selection, batch_running: bool) -> bool
    where
        B: CaptionBackend,
    {
        let Some(file) = self.image() else {
            return false;
        };
        if !selection.has_prompt_text() {
            return false;
        }
        if !selection.has_model() {
            self.set_error("Select an Ollama model before generating.".into());
            return false;
        }
        if batch_running
            || self
                .generating
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return false;
        }
        let _flag = GeneratingFlag(&self.generating);

        self.set_error(String::new());
        self.set_output(String::new());

        let prompt = selection.prompt_request();
        match backend.caption(&file, &prompt, selection.model.trim()).await {
            Ok(caption) => self.set_output(caption),
            Err(e) => {
                tracing::warn!(file = file.name(), error = %e, "single caption failed");
                self.set_error(e.to_string());
            }
        }
        true
    }
}
