// This is the entry point of the anonymous channel bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, files)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Wire the local collaborators (sink, directory) to the core
// 4. Run the operator console and background tasks until shutdown

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::config::BotConfig;
use crate::core::lexicon::LexiconStore;
use crate::core::pipeline::{
    ContentService, MediaOutcome, PublicationSink, PublishError, TextOutcome, UserDirectory,
};
use crate::core::queue::{
    Decision, ItemStatus, MediaKind, ModerationQueue, NewSubmission, PendingItem,
};
use crate::core::screening::ScreeningService;
use crate::infra::lexicon::JsonLexiconSource;
use crate::infra::queue::SqliteMediaStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

/// Sink that writes the finalized channel posts to the log. The transport
/// adapter that actually talks to the chat platform replaces this at
/// deployment time; the core never sees the difference.
struct LogPublicationSink {
    channel_id: String,
}

#[async_trait]
impl PublicationSink for LogPublicationSink {
    async fn publish_text(&self, display_name: &str, text: &str) -> Result<(), PublishError> {
        tracing::info!(channel = %self.channel_id, from = display_name, text, "channel post");
        Ok(())
    }

    async fn publish_media(
        &self,
        display_name: &str,
        item: &PendingItem,
    ) -> Result<(), PublishError> {
        tracing::info!(
            channel = %self.channel_id,
            from = display_name,
            media_ref = %item.media_ref,
            kind = %item.media_kind,
            caption = item.caption.as_deref().unwrap_or(""),
            "channel media post"
        );
        Ok(())
    }
}

/// Hands out stable anonymous pseudonyms, one per user id. The mapping lives
/// only for the process lifetime; nothing here can be traced back to a user.
struct GuestDirectory {
    names: DashMap<u64, String>,
    next: AtomicU64,
}

impl GuestDirectory {
    fn new() -> Self {
        Self {
            names: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl UserDirectory for GuestDirectory {
    async fn display_name(&self, user_id: u64) -> String {
        self.names
            .entry(user_id)
            .or_insert_with(|| {
                let n = self.next.fetch_add(1, Ordering::Relaxed);
                format!("guest-{n:04}")
            })
            .clone()
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().expect("Invalid configuration, check your .env file");

    // Keep runtime data files in a dedicated folder so the repo root stays tidy.
    std::fs::create_dir_all("data").expect("Failed to create data directory");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let lexicon = Arc::new(
        LexiconStore::load(
            Box::new(JsonLexiconSource::new(&config.lexicon_path)),
            LexiconStore::default_substitutions(),
        )
        .await
        .expect("Failed to load the word lists"),
    );
    let screener = Arc::new(ScreeningService::new(Arc::clone(&lexicon)));

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", config.queue_db_path))
        .await
        .expect("Failed to connect to queue DB");
    let media_store = SqliteMediaStore::new(pool);
    media_store
        .migrate()
        .await
        .expect("Failed to migrate queue DB");

    let (queue, mut decision_events) = ModerationQueue::new(media_store, config.max_pending_media);
    let queue = Arc::new(queue);

    let sink = Arc::new(LogPublicationSink {
        channel_id: config.channel_id.clone(),
    });
    let directory = Arc::new(GuestDirectory::new());

    let content = Arc::new(ContentService::new(
        Arc::clone(&screener),
        Arc::clone(&queue),
        Arc::clone(&directory) as Arc<dyn UserDirectory>,
        Arc::clone(&sink) as Arc<dyn PublicationSink>,
        config.max_text_len,
        config.max_pending_per_user,
        config.strict_screening,
    ));

    // Surviving pending items come back from the queue DB after a restart;
    // report them so moderators know there is work waiting.
    let pending = queue
        .list(Some(ItemStatus::Pending))
        .await
        .expect("Failed to read the moderation queue");
    tracing::info!(
        admins = config.admin_ids.len(),
        pending = pending.len(),
        "moderation queue ready"
    );
    for item in &pending {
        tracing::info!(id = %item.id, kind = %item.media_kind, "awaiting decision");
    }

    // ========================================================================
    // BACKGROUND TASKS
    // ========================================================================

    // Decision notifier: approved items get published to the channel,
    // rejections are only logged. Submitter notification rides on the same
    // events once a transport adapter is wired in.
    {
        let queue = Arc::clone(&queue);
        let content = Arc::clone(&content);
        tokio::spawn(async move {
            while let Some(event) = decision_events.recv().await {
                tracing::info!(
                    id = %event.item_id,
                    status = %event.status,
                    decided_by = event.decided_by,
                    "decision recorded"
                );

                if event.status != ItemStatus::Approved {
                    continue;
                }
                match queue.get(&event.item_id).await {
                    Ok(Some(item)) => {
                        if let Err(e) = content.publish_approved(&item).await {
                            tracing::error!(id = %event.item_id, "failed to publish approved item: {e}");
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(id = %event.item_id, "decided item no longer in store");
                    }
                    Err(e) => {
                        tracing::error!(id = %event.item_id, "failed to load decided item: {e}");
                    }
                }
            }
        });
    }

    // Hourly sweep of old decided items so the queue DB doesn't grow forever.
    {
        let queue = Arc::clone(&queue);
        let purge_after = chrono::Duration::from_std(config.purge_after)
            .expect("PURGE_AFTER_DAYS out of range");
        tokio::spawn(async move {
            loop {
                let cutoff = chrono::Utc::now() - purge_after;
                if let Err(e) = queue.purge_older_than(cutoff).await {
                    tracing::warn!("purge sweep failed: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_secs(60 * 60)).await;
            }
        });
    }

    // SIGHUP reloads the word lists without a restart. A failed reload keeps
    // the previous lexicon, so this can never leave the screener empty.
    #[cfg(unix)]
    {
        let lexicon = Arc::clone(&lexicon);
        tokio::spawn(async move {
            let mut hup =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!("SIGHUP handler unavailable: {e}");
                        return;
                    }
                };
            while hup.recv().await.is_some() {
                match lexicon.reload().await {
                    Ok(entries) => tracing::info!(entries, "word lists reloaded"),
                    Err(e) => tracing::error!("word list reload failed: {e}"),
                }
            }
        });
    }

    tracing::info!(channel = %config.channel_id, "bot is ready");

    tokio::select! {
        _ = run_console(&config, &content, &queue, &screener, &lexicon) => {}
        result = tokio::signal::ctrl_c() => {
            result.expect("Failed to listen for shutdown signal");
        }
    }
    tracing::info!("shutting down");
}

/// Operator console on stdin. Drives the same core operations a transport
/// adapter would, one line per action. Ends on EOF or `quit`.
async fn run_console(
    config: &BotConfig,
    content: &ContentService<SqliteMediaStore>,
    queue: &ModerationQueue<SqliteMediaStore>,
    screener: &ScreeningService,
    lexicon: &LexiconStore,
) {
    println!("commands:");
    println!("  text <user_id> <message...>");
    println!("  media <user_id> <photo|video|other> <media_ref> [caption...]");
    println!("  approve|reject <admin_id> <item_id...>");
    println!("  list | stats | censor <text...> | reload | purge <item_id> | quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("console read failed: {e}");
                return;
            }
        };
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("text") => {
                let Some(user_id) = parts.next().and_then(|p| p.parse::<u64>().ok()) else {
                    println!("usage: text <user_id> <message...>");
                    continue;
                };
                let message = parts.collect::<Vec<_>>().join(" ");
                match content.submit_text(user_id, &message).await {
                    Ok(TextOutcome::Published { display_name }) => {
                        println!("published as {display_name}");
                    }
                    Ok(TextOutcome::Refused(reason)) => println!("refused: {reason:?}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Some("media") => {
                let Some(user_id) = parts.next().and_then(|p| p.parse::<u64>().ok()) else {
                    println!("usage: media <user_id> <kind> <media_ref> [caption...]");
                    continue;
                };
                let kind = MediaKind::parse(parts.next().unwrap_or("other"));
                let Some(media_ref) = parts.next() else {
                    println!("usage: media <user_id> <kind> <media_ref> [caption...]");
                    continue;
                };
                let caption = parts.collect::<Vec<_>>().join(" ");
                let mut submission = NewSubmission::new(user_id, media_ref, kind);
                if !caption.is_empty() {
                    submission = submission.with_caption(caption);
                }
                match content.submit_media(submission).await {
                    Ok(MediaOutcome::Queued { id }) => println!("queued as {id}"),
                    Ok(MediaOutcome::Refused(reason)) => println!("refused: {reason:?}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            verb @ (Some("approve") | Some("reject")) => {
                let decision = if verb == Some("approve") {
                    Decision::Approve
                } else {
                    Decision::Reject
                };
                let Some(admin_id) = parts.next().and_then(|p| p.parse::<u64>().ok()) else {
                    println!("usage: approve|reject <admin_id> <item_id...>");
                    continue;
                };
                if !config.is_admin(admin_id) {
                    println!("{admin_id} is not an admin");
                    continue;
                }
                let ids: Vec<String> = parts.map(str::to_string).collect();
                if ids.is_empty() {
                    println!("usage: approve|reject <admin_id> <item_id...>");
                    continue;
                }
                for (id, result) in queue.bulk_decide(&ids, decision, admin_id).await {
                    match result {
                        Ok(item) => println!("{id}: {}", item.status),
                        Err(e) => println!("{id}: {e}"),
                    }
                }
            }
            Some("list") => match queue.list(Some(ItemStatus::Pending)).await {
                Ok(items) => {
                    for item in &items {
                        println!(
                            "{} {} {} caption={:?}",
                            item.id, item.media_kind, item.media_ref, item.caption
                        );
                    }
                    println!("{} pending (capacity {})", items.len(), queue.capacity());
                }
                Err(e) => println!("error: {e}"),
            },
            Some("stats") => match queue.stats().await {
                Ok(stats) => {
                    println!(
                        "total={} pending={} approved={} rejected={}",
                        stats.total, stats.pending, stats.approved, stats.rejected
                    );
                    for (kind, count) in &stats.by_kind {
                        println!("  {kind}: {count}");
                    }
                    if let Some(oldest) = stats.oldest_pending {
                        println!("  oldest pending: {}", oldest.to_rfc3339());
                    }
                }
                Err(e) => println!("error: {e}"),
            },
            Some("censor") => {
                let text = parts.collect::<Vec<_>>().join(" ");
                println!("{}", screener.censor(&text));
            }
            Some("reload") => match lexicon.reload().await {
                Ok(entries) => println!("word lists reloaded, {entries} entries"),
                Err(e) => println!("reload failed: {e}"),
            },
            Some("purge") => {
                let Some(id) = parts.next() else {
                    println!("usage: purge <item_id>");
                    continue;
                };
                match queue.purge(id).await {
                    Ok(()) => println!("ok"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Some("quit") => return,
            Some(other) => println!("unknown command: {other}"),
            None => {}
        }
    }
}
