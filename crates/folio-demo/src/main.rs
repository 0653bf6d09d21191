//! folio-demo - walks a blog post through edits, review, branching and merge.
//!
//! Storage follows `FOLIO_*` environment variables, or the file named by
//! `FOLIO_CONFIG` when set.

use anyhow::Context;
use folio_core::{ContentStatus, FolioConfig, VersionControl};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const INITIAL: &str = "# My First Blog Post

Welcome to my blog! This is the introduction.

## Main Content

This is where the main content goes. I'll be writing about various topics.

## Conclusion

Thanks for reading!
";

const EDITED: &str = "# My First Blog Post - Updated

Welcome to my blog! This is an improved introduction with more context.

## Main Content

This is where the main content goes. I'll be writing about systems programming,
storage engines, and software engineering practices.

## Examples

Here are some code examples to illustrate my points.

## Conclusion

Thanks for reading! Stay tuned for more posts.
";

fn load_config() -> anyhow::Result<FolioConfig> {
    match std::env::var("FOLIO_CONFIG") {
        Ok(path) => FolioConfig::from_file(&path).with_context(|| format!("loading {}", path)),
        Err(_) => FolioConfig::from_env().context("reading FOLIO_* environment"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("folio_core=debug".parse()?)
                .add_directive("folio_demo=debug".parse()?),
        )
        .init();

    let store = VersionControl::from_config(load_config()?)?;

    let mut events = store.subscribe();
    let listener = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(event) = events.recv().await {
            tracing::debug!(event = event.event_type(), content_id = %event.content_id, actor = %event.actor, "event");
            seen += 1;
        }
        seen
    });

    // Unique id so repeated runs against persistent storage don't collide
    let content_id = format!(
        "blog-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs()
    );

    let v1 = store.create_content(&content_id, "My First Blog Post", INITIAL, "Alice", None)?;
    info!(version = %v1.version_id, words = v1.word_count, "1. Created initial content");

    let v2 = store.commit_changes(
        &content_id,
        EDITED,
        "Alice",
        "Added more detail and examples section",
        None,
    )?;
    let summary = v2.changes_summary.unwrap_or_default();
    info!(
        version = %v2.version_id,
        added = summary.added,
        removed = summary.removed,
        modified = summary.modified,
        total = summary.total(),
        "2. Committed changes"
    );

    let branch = store.create_branch(&content_id, "review-draft", "Bob", "Review and editing branch", None)?;
    info!(branch = %branch.branch_name, "3. Created branch");

    store.switch_branch(&content_id, "review-draft")?;
    let reviewed = EDITED.replace("Stay tuned for more posts.", "Subscribe for more posts!");
    let v3 = store.commit_changes(&content_id, &reviewed, "Bob", "Reviewer edits to the conclusion", None)?;
    info!(version = %v3.version_id, branch = %v3.branch, "4. Committed on review branch");

    let diff = store.get_default_diff(&content_id, &v1.version_id, &v2.version_id)?;
    info!(
        added = diff.lines_added,
        removed = diff.lines_removed,
        modified = diff.lines_modified,
        similarity = diff.similarity_score,
        "5. Diff between v1 and v2"
    );
    println!("{}", diff.diff_text);

    store.add_comment(&content_id, &v3.version_id, "Carol", "Great conclusion!", Some(16))?;
    store.add_reviewer(&content_id, &v3.version_id, "Carol")?;
    store.update_status(&content_id, &v3.version_id, ContentStatus::InReview, "Bob")?;
    info!("6. Added review comment and moved to review");

    let outcome = store.merge_branches(&content_id, "review-draft", "main", "Alice", "Merge review changes", false)?;
    if outcome.blocked() {
        warn!(conflicts = outcome.conflicts.len(), "7. Merge blocked by conflicts");
    } else {
        info!(version = %outcome.version.version_id, "7. Merged review-draft into main");
    }

    store.tag_version(&content_id, &outcome.version.version_id, "v1.0", "Alice", Some("First release"))?;
    store.update_status(&content_id, &outcome.version.version_id, ContentStatus::Published, "Alice")?;
    info!("8. Tagged v1.0 and published");

    for version in store.get_version_history(&content_id, None, Some(10))? {
        info!(
            number = version.version_number,
            kind = version.change_type.as_str(),
            branch = %version.branch,
            author = %version.author,
            message = %version.commit_message,
            "history"
        );
    }

    let summary = store.get_summary(&content_id)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    drop(store);
    let seen = listener.await?;
    info!(events = seen, "Done");
    Ok(())
}
