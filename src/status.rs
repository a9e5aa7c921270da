//! Display projections over the batch queue.
//!
//! Both functions are pure: they read an item list and the run flag and
//! produce the label and summary line a UI shows. Recompute them from each
//! published [`QueueSnapshot`] rather than caching.

use crate::types::{ItemStatus, QueueItem, QueueSnapshot};

#[derive(Default)]
struct Counts {
    succeeded: usize,
    failed: usize,
}

impl Counts {
    fn of(items: &[QueueItem]) -> Self {
        items.iter().fold(Counts::default(), |mut acc, item| {
            match item.status {
                ItemStatus::Success => acc.succeeded += 1,
                ItemStatus::Error => acc.failed += 1,
                ItemStatus::Pending | ItemStatus::Running => {}
            }
            acc
        })
    }

    fn finished(&self) -> usize {
        self.succeeded + self.failed
    }
}

fn failed_suffix(failed: usize) -> String {
    if failed > 0 {
        format!(", {} failed", failed)
    } else {
        String::new()
    }
}

/// 1-based position of the item being processed.
///
/// Uses the `Running` item when there is one; between two items it falls
/// back to the number of finished items plus one, capped at the total.
pub fn current_position(items: &[QueueItem]) -> usize {
    match items.iter().position(|i| i.status == ItemStatus::Running) {
        Some(index) => index + 1,
        None => (Counts::of(items).finished() + 1).min(items.len()),
    }
}

/// Label for the batch action button.
pub fn progress_label(items: &[QueueItem], running: bool) -> String {
    let total = items.len();
    if total == 0 {
        return "Generate batch captions".to_string();
    }
    if running {
        return format!("Processing {}/{}…", current_position(items), total);
    }
    if items.iter().all(|i| i.status == ItemStatus::Success) {
        return format!("Re-run batch ({})", total);
    }
    if items.iter().any(|i| i.status == ItemStatus::Error) {
        return format!("Retry batch ({})", total);
    }
    format!("Generate batch captions ({})", total)
}

/// One-line progress or completion summary. Empty when there is nothing to report.
pub fn summary(items: &[QueueItem], running: bool) -> String {
    let total = items.len();
    if total == 0 {
        return String::new();
    }

    let counts = Counts::of(items);
    if running {
        if counts.finished() == 0 {
            return format!("Processing {} images…", total);
        }
        return format!(
            "Processed {} of {} images{}",
            counts.finished(),
            total,
            failed_suffix(counts.failed)
        );
    }

    if counts.finished() == 0 {
        return String::new();
    }
    format!(
        "Batch complete: {}/{} succeeded{}",
        counts.succeeded,
        total,
        failed_suffix(counts.failed)
    )
}

impl QueueSnapshot {
    pub fn progress_label(&self) -> String {
        progress_label(&self.items, self.running)
    }

    pub fn summary(&self) -> String {
        summary(&self.items, self.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageFile;

    fn items_with(statuses: &[ItemStatus]) -> Vec<QueueItem> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut item = QueueItem::new(ImageFile::new(format!("img-{}.png", i), vec![0u8]));
                match status {
                    ItemStatus::Pending => {}
                    ItemStatus::Running => item.start(),
                    ItemStatus::Success => item.succeed("caption".into(), 10),
                    ItemStatus::Error => item.fail("failed".into(), 10),
                }
                item
            })
            .collect()
    }

    use ItemStatus::*;

    #[test]
    fn test_empty_queue() {
        assert_eq!(progress_label(&[], false), "Generate batch captions");
        assert_eq!(progress_label(&[], true), "Generate batch captions");
        assert_eq!(summary(&[], false), "");
        assert_eq!(summary(&[], true), "");
    }

    #[test]
    fn test_label_while_running_uses_running_item() {
        let items = items_with(&[Success, Running, Pending]);
        assert_eq!(progress_label(&items, true), "Processing 2/3…");
    }

    #[test]
    fn test_label_while_running_between_items() {
        let items = items_with(&[Success, Error, Pending]);
        assert_eq!(progress_label(&items, true), "Processing 3/3…");

        let items = items_with(&[Pending, Pending]);
        assert_eq!(progress_label(&items, true), "Processing 1/2…");
    }

    #[test]
    fn test_position_is_capped_at_total() {
        let items = items_with(&[Success, Success]);
        assert_eq!(current_position(&items), 2);
    }

    #[test]
    fn test_label_when_idle() {
        assert_eq!(
            progress_label(&items_with(&[Success, Success]), false),
            "Re-run batch (2)"
        );
        assert_eq!(
            progress_label(&items_with(&[Success, Error]), false),
            "Retry batch (2)"
        );
        assert_eq!(
            progress_label(&items_with(&[Pending, Pending, Pending]), false),
            "Generate batch captions (3)"
        );
    }

    #[test]
    fn test_summary_while_running() {
        assert_eq!(
            summary(&items_with(&[Running, Pending]), true),
            "Processing 2 images…"
        );
        assert_eq!(
            summary(&items_with(&[Success, Running, Pending]), true),
            "Processed 1 of 3 images"
        );
        assert_eq!(
            summary(&items_with(&[Success, Error, Running]), true),
            "Processed 2 of 3 images, 1 failed"
        );
    }

    #[test]
    fn test_summary_when_finished() {
        assert_eq!(
            summary(&items_with(&[Success, Success]), false),
            "Batch complete: 2/2 succeeded"
        );
        assert_eq!(
            summary(&items_with(&[Error]), false),
            "Batch complete: 0/1 succeeded, 1 failed"
        );
    }

    #[test]
    fn test_summary_empty_before_any_run() {
        assert_eq!(summary(&items_with(&[Pending, Pending]), false), "");
    }
}
