//! # caption-batch
//!
//! Sequential batch image captioning against a remote vision inference backend.
//!
//! ## Key Features
//!
//! - **Strictly sequential runs** — one caption request in flight at a time,
//!   items processed in the order they were queued
//! - **Per-item failure isolation** — a failed (or panicking) request marks its
//!   item as `Error` and the run carries on
//! - **Consistent snapshots** — every state change publishes a whole new item
//!   list through a `tokio::sync::watch` channel
//! - **Derived status** — progress label and summary line computed from any
//!   snapshot
//! - **Selection handling** — model and saved/free prompt reconciliation
//!
//! ## Quick Start
//!
//! ```no_run
//! use caption_batch::{BatchQueue, CaptionClient, ClientConfig, ImageFile, Selection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CaptionClient::new(ClientConfig::from_env());
//!
//!     let mut selection = Selection::new("llava");
//!     selection.apply_models(&client.list_models().await?);
//!     selection.apply_prompts(client.list_prompts().await?);
//!
//!     let queue = BatchQueue::new();
//!     queue.enqueue(vec![ImageFile::new("a.png", std::fs::read("a.png")?)]);
//!
//!     let outcome = queue.run(&client, &selection.context(false)).await;
//!     println!("{:?}", outcome.summary());
//!     println!("{}", queue.snapshot().summary());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod queue;
pub mod selection;
pub mod single;
pub mod status;
pub mod types;

pub use client::CaptionClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{CaptionError, Result};
pub use guard::can_submit;
pub use queue::{BatchQueue, RunOutcome, RunRejection};
pub use selection::{PromptTab, SavedPrompt, Selection};
pub use single::SingleCaption;
pub use status::{progress_label, summary};
pub use types::{
    BatchRunSummary, ImageFile, ItemStatus, PromptRequest, QueueItem, QueueSnapshot,
    SelectionContext,
};

/// Something that can caption one image.
///
/// [`CaptionClient`] is the HTTP implementation; tests and alternative
/// transports provide their own.
///
/// # Example
///
/// ```
/// use caption_batch::*;
///
/// struct Echo;
///
/// impl CaptionBackend for Echo {
///     async fn caption(
///         &self,
///         file: &ImageFile,
///         prompt: &PromptRequest,
///         _model: &str,
///     ) -> caption_batch::Result<String> {
///         Ok(format!("{}: {}", file.name(), prompt.text))
///     }
/// }
/// ```
pub trait CaptionBackend: Send + Sync {
    /// Caption a single image. Called at most once per item per run.
    ///
    /// # Arguments
    /// * `file` — the image payload
    /// * `prompt` — resolved prompt text and optional saved-prompt id
    /// * `model` — model name, already trimmed
    fn caption(
        &self,
        file: &ImageFile,
        prompt: &PromptRequest,
        model: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}
