//! Caption every image given on the command line, one at a time.
//!
//! ```text
//! CAPTION_API_BASE=http://localhost:8000 CAPTION_DEFAULT_MODEL=llava \
//!     cargo run --example batch_caption -- "Describe this image." a.png b.jpg
//! ```

use std::path::PathBuf;

use anyhow::Context;
use caption_batch::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let prompt = args
        .next()
        .context("usage: batch_caption <prompt> <image>...")?;
    let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let config = ClientConfig::from_env();
    let client = CaptionClient::new(config.clone());

    if !client.health().await.unwrap_or(false) {
        anyhow::bail!("caption service at {} is not healthy", config.api_base);
    }

    let mut selection = Selection::new(config.default_model.clone());
    selection.apply_models(&client.list_models().await?);
    selection.tab = PromptTab::Free;
    selection.free_text = prompt;
    println!("Model: {}", selection.model);

    let queue = BatchQueue::new();
    queue.enqueue_paths(paths).await?;

    let mut rx = queue.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            let summary = snap.summary();
            if summary.is_empty() {
                println!("{}", snap.progress_label());
            } else {
                println!("{} | {}", snap.progress_label(), summary);
            }
        }
    });

    let outcome = queue.run(&client, &selection.context(false)).await;
    if let Some(rejection) = outcome.rejection() {
        anyhow::bail!("{}", rejection.message());
    }

    for item in queue.snapshot().items.iter() {
        match item.status {
            ItemStatus::Success => println!("{}: {}", item.name, item.caption),
            _ => println!("{}: FAILED ({})", item.name, item.error),
        }
    }

    drop(queue);
    let _ = printer.await;
    Ok(())
}
