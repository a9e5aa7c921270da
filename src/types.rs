use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CaptionError, Result};

/// An image payload handed to the caption service.
///
/// The bytes are shared, so cloning an `ImageFile` (and the queue items that
/// hold one) never copies the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    /// Wrap in-memory bytes. The MIME type is guessed from the name's extension.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime,
            bytes: bytes.into(),
        }
    }

    /// Load an image from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CaptionError::ImageRead(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-item lifecycle within the batch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// One queued image and the outcome of its latest captioning attempt.
///
/// `caption` is non-empty only in `Success` and `error` only in `Error`;
/// every other state carries empty strings in both.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique identifier, stable for the life of the queue.
    pub id: String,
    #[serde(skip)]
    pub file: ImageFile,
    /// Display name taken from the file at enqueue time.
    pub name: String,
    pub status: ItemStatus,
    pub caption: String,
    pub error: String,
    /// Wall time of the last caption request, once it finished.
    pub duration_ms: Option<u64>,
}

impl QueueItem {
    /// Build a fresh `Pending` item from a file.
    pub fn new(file: ImageFile) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: file.name().to_string(),
            file,
            status: ItemStatus::Pending,
            caption: String::new(),
            error: String::new(),
            duration_ms: None,
        }
    }

    /// `Success` or `Error`.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, ItemStatus::Success | ItemStatus::Error)
    }

    pub(crate) fn reset(&mut self) {
        self.status = ItemStatus::Pending;
        self.caption.clear();
        self.error.clear();
        self.duration_ms = None;
    }

    pub(crate) fn start(&mut self) {
        self.reset();
        self.status = ItemStatus::Running;
    }

    pub(crate) fn succeed(&mut self, caption: String, duration_ms: u64) {
        self.status = ItemStatus::Success;
        self.caption = caption;
        self.error.clear();
        self.duration_ms = Some(duration_ms);
    }

    pub(crate) fn fail(&mut self, error: String, duration_ms: u64) {
        self.status = ItemStatus::Error;
        self.caption.clear();
        self.error = error;
        self.duration_ms = Some(duration_ms);
    }
}

/// The prompt as it is sent with a caption request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Resolved prompt text.
    pub text: String,
    /// Saved-prompt identifier. Free-text prompts never carry one.
    pub prompt_id: Option<String>,
}

impl PromptRequest {
    /// A free-text prompt.
    pub fn free(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_id: None,
        }
    }

    /// A saved prompt with its identifier.
    pub fn saved(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_id: Some(id.into()),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Read-only snapshot of the selection owned outside the queue.
///
/// Taken once when a batch run starts.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub model: String,
    pub prompt: PromptRequest,
    /// A single-image generation is in flight.
    pub generating: bool,
}

impl SelectionContext {
    pub fn new(model: impl Into<String>, prompt: PromptRequest) -> Self {
        Self {
            model: model.into(),
            prompt,
            generating: false,
        }
    }

    pub fn with_generating(mut self, generating: bool) -> Self {
        self.generating = generating;
        self
    }

    pub fn has_model(&self) -> bool {
        !self.model.trim().is_empty()
    }
}

/// Result of one completed batch run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub avg_duration_ms: u64,
}

impl BatchRunSummary {
    pub(crate) fn from_items(
        items: &[QueueItem],
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let succeeded = items
            .iter()
            .filter(|i| i.status == ItemStatus::Success)
            .count();
        let failed = items
            .iter()
            .filter(|i| i.status == ItemStatus::Error)
            .count();
        let total_ms: u64 = items.iter().filter_map(|i| i.duration_ms).sum();
        let processed = succeeded + failed;
        let avg_ms = if processed > 0 {
            total_ms / processed as u64
        } else {
            0
        };

        Self {
            total: items.len(),
            succeeded,
            failed,
            started_at,
            completed_at,
            total_duration_ms: total_ms,
            avg_duration_ms: avg_ms,
        }
    }
}

/// A consistent view of the queue, published after every mutation.
///
/// Readers hold an `Arc` to an immutable item list; the queue replaces it
/// wholesale, so a snapshot is never observed half-updated.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub items: Arc<Vec<QueueItem>>,
    pub running: bool,
    /// Run-level banner message, empty when there is nothing to report.
    pub banner: String,
}
