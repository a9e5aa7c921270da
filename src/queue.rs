use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::*;
use crate::CaptionBackend;

/// Why [`BatchQueue::run`] refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRejection {
    EmptyQueue,
    MissingPrompt,
    MissingModel,
    /// A batch run or a single generation is already in flight.
    Busy,
}

impl RunRejection {
    /// Banner text shown for the rejection. `Busy` shows nothing.
    pub fn message(&self) -> &'static str {
        match self {
            RunRejection::EmptyQueue => "Add at least one image to the batch.",
            RunRejection::MissingPrompt => "Provide prompt text before running the batch.",
            RunRejection::MissingModel => "Select an Ollama model before running the batch.",
            RunRejection::Busy => "",
        }
    }
}

/// Outcome of a call to [`BatchQueue::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(BatchRunSummary),
    Rejected(RunRejection),
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&BatchRunSummary> {
        match self {
            RunOutcome::Completed(summary) => Some(summary),
            RunOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<RunRejection> {
        match self {
            RunOutcome::Completed(_) => None,
            RunOutcome::Rejected(r) => Some(*r),
        }
    }
}

/// Sequential batch captioning queue.
///
/// Items run strictly in insertion order, one request at a time. A failed
/// item records its message and the run moves on; nothing is retried until
/// the next run, which resets every item.
///
/// State lives in a `watch` channel: each mutation replaces the item list
/// wholesale and notifies subscribers, so any [`QueueSnapshot`] a reader
/// holds stays internally consistent.
pub struct BatchQueue {
    state: watch::Sender<QueueSnapshot>,
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the run flag when dropped, however the run loop exits.
///
/// An item left `Running` (the run future was dropped mid-request) goes back
/// to `Pending` in the same update.
struct RunRelease<'a> {
    queue: &'a BatchQueue,
}

impl Drop for RunRelease<'_> {
    fn drop(&mut self) {
        self.queue.state.send_modify(|snap| {
            snap.running = false;
            if snap.items.iter().any(|i| i.status == ItemStatus::Running) {
                Arc::make_mut(&mut snap.items)
                    .iter_mut()
                    .filter(|i| i.status == ItemStatus::Running)
                    .for_each(QueueItem::reset);
            }
        });
    }
}

impl BatchQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        let (state, _) = watch::channel(QueueSnapshot::default());
        Self { state }
    }

    /// Current state (cheap: the item list is shared).
    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.borrow().clone()
    }

    /// Receive every published state. Intermediate states may be coalesced
    /// for slow receivers; the latest one is always delivered.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn banner(&self) -> String {
        self.state.borrow().banner.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the queue with fresh `Pending` items, one per file, in order.
    ///
    /// Ignored while a run is in progress. Clears the banner. Returns whether
    /// the queue was replaced.
    pub fn enqueue<I>(&self, files: I) -> bool
    where
        I: IntoIterator<Item = ImageFile>,
    {
        let items: Vec<QueueItem> = files.into_iter().map(QueueItem::new).collect();
        let count = items.len();
        let accepted = self.state.send_if_modified(|snap| {
            if snap.running {
                return false;
            }
            snap.items = Arc::new(items);
            snap.banner.clear();
            true
        });

        if accepted {
            tracing::debug!(count, "batch queue replaced");
        } else {
            tracing::debug!("enqueue ignored: batch run in progress");
        }
        accepted
    }

    /// Load images from disk and [`enqueue`](Self::enqueue) them.
    ///
    /// Fails without touching the queue if any file cannot be read.
    pub async fn enqueue_paths<I>(&self, paths: I) -> Result<bool>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut files = Vec::new();
        for path in paths {
            files.push(ImageFile::from_path(&path).await?);
        }
        Ok(self.enqueue(files))
    }

    /// Empty the queue and clear the banner. Ignored while a run is in progress.
    pub fn clear(&self) -> bool {
        self.state.send_if_modified(|snap| {
            if snap.running {
                return false;
            }
            snap.items = Arc::new(Vec::new());
            snap.banner.clear();
            true
        })
    }

    /// Caption every queued item, in order, one at a time.
    ///
    /// Preconditions are checked in order (items queued, prompt text, model,
    /// nothing in flight); the first failure sets the banner and returns
    /// without touching the items. `Busy` leaves the banner as it is.
    ///
    /// Otherwise every item is reset to `Pending` and the run proceeds to the
    /// end: each item is published as `Running` before its request is sent
    /// and published again with its caption or error. A panic inside the
    /// backend is caught and recorded on that item. The run flag is released
    /// on every exit path, including the caller dropping this future.
    pub async fn run<B>(&self, backend: &B, ctx: &SelectionContext) -> RunOutcome
    where
        B: CaptionBackend,
    {
        let mut rejection = None;
        self.state.send_if_modified(|snap| {
            let check = if snap.items.is_empty() {
                Some(RunRejection::EmptyQueue)
            } else if !ctx.prompt.has_text() {
                Some(RunRejection::MissingPrompt)
            } else if !ctx.has_model() {
                Some(RunRejection::MissingModel)
            } else if snap.running || ctx.generating {
                Some(RunRejection::Busy)
            } else {
                None
            };

            match check {
                Some(RunRejection::Busy) => {
                    rejection = Some(RunRejection::Busy);
                    false
                }
                Some(r) => {
                    snap.banner = r.message().to_string();
                    rejection = Some(r);
                    true
                }
                None => {
                    snap.banner.clear();
                    snap.running = true;
                    Arc::make_mut(&mut snap.items)
                        .iter_mut()
                        .for_each(QueueItem::reset);
                    true
                }
            }
        });

        if let Some(r) = rejection {
            tracing::debug!(reason = ?r, "batch run rejected");
            return RunOutcome::Rejected(r);
        }

        let release = RunRelease { queue: self };
        // Let subscribers see the reset state before the first item starts.
        tokio::task::yield_now().await;
        let started_at = chrono::Utc::now();
        let total = self.len();
        tracing::info!(total, model = %ctx.model, "batch run started");

        for index in 0..total {
            let file = match self.state.borrow().items.get(index) {
                Some(item) => item.file.clone(),
                None => break,
            };
            self.update_item(index, QueueItem::start);

            let start = Instant::now();
            // The call itself sits inside the guarded future: a backend may
            // panic before it hands back its future.
            let result =
                AssertUnwindSafe(async { backend.caption(&file, &ctx.prompt, &ctx.model).await })
                    .catch_unwind()
                    .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(Ok(caption)) => {
                    self.update_item(index, |item| item.succeed(caption, duration_ms));
                }
                Ok(Err(e)) => {
                    tracing::warn!(item = file.name(), error = %e, "caption request failed");
                    let message = e.to_string();
                    self.update_item(index, |item| item.fail(message, duration_ms));
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::warn!(item = file.name(), error = %message, "caption request panicked");
                    self.update_item(index, |item| item.fail(message, duration_ms));
                }
            }
        }

        drop(release);

        let snap = self.snapshot();
        let summary = BatchRunSummary::from_items(&snap.items, started_at, chrono::Utc::now());
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = summary.total_duration_ms,
            "batch run finished"
        );
        RunOutcome::Completed(summary)
    }

    /// Publish a change to one item as a new item list.
    fn update_item(&self, index: usize, f: impl FnOnce(&mut QueueItem)) {
        self.state.send_modify(|snap| {
            if let Some(item) = Arc::make_mut(&mut snap.items).get_mut(index) {
                f(item);
            }
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Unexpected failure: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Unexpected failure: {}", s)
    } else {
        "Unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<ImageFile> {
        names
            .iter()
            .map(|n| ImageFile::new(*n, vec![0u8; 4]))
            .collect()
    }

    #[test]
    fn test_enqueue_builds_pending_items_in_order() {
        let queue = BatchQueue::new();
        assert!(queue.enqueue(files(&["a.png", "b.png", "c.png"])));

        let snap = queue.snapshot();
        let names: Vec<&str> = snap.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        assert!(snap
            .items
            .iter()
            .all(|i| i.status == ItemStatus::Pending && i.caption.is_empty() && i.error.is_empty()));
    }

    #[test]
    fn test_enqueue_replaces_and_clears_banner() {
        let queue = BatchQueue::new();
        queue.state.send_modify(|s| s.banner = "old".into());
        queue.enqueue(files(&["a.png", "b.png"]));
        queue.enqueue(files(&["c.png"]));
        assert_eq!(queue.len(), 1);
        assert!(queue.banner().is_empty());
    }

    #[test]
    fn test_enqueue_and_clear_ignored_while_running() {
        let queue = BatchQueue::new();
        queue.enqueue(files(&["a.png"]));
        queue.state.send_modify(|s| s.running = true);

        assert!(!queue.enqueue(files(&["b.png", "c.png"])));
        assert!(!queue.clear());
        assert_eq!(queue.snapshot().items[0].name, "a.png");
    }

    #[test]
    fn test_clear() {
        let queue = BatchQueue::new();
        queue.enqueue(files(&["a.png"]));
        assert!(queue.clear());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_old_snapshot_is_unchanged_by_updates() {
        let queue = BatchQueue::new();
        queue.enqueue(files(&["a.png"]));
        let before = queue.snapshot();

        queue.update_item(0, QueueItem::start);

        assert_eq!(before.items[0].status, ItemStatus::Pending);
        assert_eq!(queue.snapshot().items[0].status, ItemStatus::Running);
    }

    #[test]
    fn test_release_clears_running_flag() {
        let queue = BatchQueue::new();
        queue.state.send_modify(|s| s.running = true);
        {
            let _release = RunRelease { queue: &queue };
        }
        assert!(!queue.is_running());
    }

    #[test]
    fn test_release_resets_running_item() {
        let queue = BatchQueue::new();
        queue.enqueue(files(&["a.png", "b.png"]));
        queue.state.send_modify(|s| s.running = true);
        queue.update_item(0, |item| item.succeed("done".into(), 3));
        queue.update_item(1, QueueItem::start);
        {
            let _release = RunRelease { queue: &queue };
        }

        let snap = queue.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.items[0].status, ItemStatus::Success);
        assert_eq!(snap.items[0].caption, "done");
        assert_eq!(snap.items[1].status, ItemStatus::Pending);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "Unexpected failure: boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "Unexpected failure");
    }
}
