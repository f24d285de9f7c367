// Content intake pipeline - glues the screener, the moderation queue and the
// external collaborators together.
//
// Flow: inbound text is screened and, when clean, published immediately under
// the submitter's display identity. Inbound media has its caption screened,
// then waits in the moderation queue for an admin decision.
//
// The transport, the user registry and the channel itself are external
// collaborators behind the ports below; this service only produces the exact
// payloads they expect.

use crate::core::lexicon::LexiconHit;
use crate::core::queue::{MediaStore, ModerationQueue, NewSubmission, PendingItem, QueueError};
use crate::core::screening::ScreeningService;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// COLLABORATOR PORTS
// ============================================================================

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// The broadcast channel. Accepts a finalized (content, display identity)
/// pair for posting; everything behind it is out of scope for the core.
#[async_trait]
pub trait PublicationSink: Send + Sync {
    async fn publish_text(&self, display_name: &str, text: &str) -> Result<(), PublishError>;

    async fn publish_media(
        &self,
        display_name: &str,
        item: &PendingItem,
    ) -> Result<(), PublishError>;
}

/// Black-box lookup returning a stable display identity per user id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: u64) -> String;
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// What happened to a text submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TextOutcome {
    Published { display_name: String },
    Refused(TextRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextRefusal {
    /// The screener flagged the text; the hit says which token and script.
    Profanity { hit: LexiconHit },
    TooLong { len: usize, max: usize },
}

/// What happened to a media submission.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOutcome {
    /// Queued for moderation under the returned id.
    Queued { id: String },
    Refused(MediaRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaRefusal {
    CaptionProfanity { hit: LexiconHit },
    /// The submitter already has too many undecided items.
    TooManyPending { pending: u64, max: usize },
    /// The whole queue is at capacity; the submitter may retry later.
    QueueFull { capacity: usize },
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ContentService<S: MediaStore> {
    screener: Arc<ScreeningService>,
    queue: Arc<ModerationQueue<S>>,
    users: Arc<dyn UserDirectory>,
    sink: Arc<dyn PublicationSink>,
    max_text_len: usize,
    max_pending_per_user: usize,
    strict_screening: bool,
}

impl<S: MediaStore> ContentService<S> {
    pub fn new(
        screener: Arc<ScreeningService>,
        queue: Arc<ModerationQueue<S>>,
        users: Arc<dyn UserDirectory>,
        sink: Arc<dyn PublicationSink>,
        max_text_len: usize,
        max_pending_per_user: usize,
        strict_screening: bool,
    ) -> Self {
        Self {
            screener,
            queue,
            users,
            sink,
            max_text_len,
            max_pending_per_user,
            strict_screening,
        }
    }

    /// Handle an inbound text message: length check, screening, then
    /// immediate anonymous publication.
    pub async fn submit_text(
        &self,
        submitter_id: u64,
        text: &str,
    ) -> Result<TextOutcome, PublishError> {
        let len = text.chars().count();
        if len > self.max_text_len {
            return Ok(TextOutcome::Refused(TextRefusal::TooLong {
                len,
                max: self.max_text_len,
            }));
        }

        let result = self.screener.screen(text, self.strict_screening);
        if let Some(hit) = result.first_match {
            tracing::warn!(
                submitter_id,
                script = %hit.script,
                "text submission refused by screener"
            );
            return Ok(TextOutcome::Refused(TextRefusal::Profanity { hit }));
        }

        let display_name = self.users.display_name(submitter_id).await;
        self.sink.publish_text(&display_name, text).await?;
        tracing::info!(submitter_id, "text published to channel");

        Ok(TextOutcome::Published { display_name })
    }

    /// Handle an inbound media message: screen the caption, enforce the
    /// per-user pending cap, then hand it to the moderation queue.
    pub async fn submit_media(
        &self,
        submission: NewSubmission,
    ) -> Result<MediaOutcome, QueueError> {
        if let Some(caption) = &submission.caption {
            let result = self.screener.screen(caption, self.strict_screening);
            if let Some(hit) = result.first_match {
                tracing::warn!(
                    submitter_id = submission.submitter_id,
                    script = %hit.script,
                    "media caption refused by screener"
                );
                return Ok(MediaOutcome::Refused(MediaRefusal::CaptionProfanity {
                    hit,
                }));
            }
        }

        let pending = self
            .queue
            .pending_count_for(submission.submitter_id)
            .await?;
        if pending >= self.max_pending_per_user as u64 {
            return Ok(MediaOutcome::Refused(MediaRefusal::TooManyPending {
                pending,
                max: self.max_pending_per_user,
            }));
        }

        match self.queue.enqueue(submission).await {
            Ok(id) => Ok(MediaOutcome::Queued { id }),
            Err(QueueError::Full { capacity }) => {
                Ok(MediaOutcome::Refused(MediaRefusal::QueueFull { capacity }))
            }
            Err(other) => Err(other),
        }
    }

    /// Publish an approved item to the channel under the submitter's display
    /// identity. Called by the moderation UI collaborator after `decide`
    /// returned an approved item.
    pub async fn publish_approved(&self, item: &PendingItem) -> Result<(), PublishError> {
        let display_name = self.users.display_name(item.submitter_id).await;
        self.sink.publish_media(&display_name, item).await?;
        tracing::info!(id = %item.id, kind = %item.media_kind, "approved media published to channel");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::{LexiconDocument, LexiconError, LexiconSource, LexiconStore, WordSpec};
    use crate::core::queue::{Decision, MediaKind};
    use crate::infra::queue::InMemoryMediaStore;
    use std::sync::Mutex;

    struct FixedSource(LexiconDocument);

    #[async_trait]
    impl LexiconSource for FixedSource {
        async fn load(&self) -> Result<LexiconDocument, LexiconError> {
            Ok(self.0.clone())
        }
    }

    /// Sink that records everything it is asked to publish.
    #[derive(Default)]
    struct RecordingSink {
        texts: Mutex<Vec<(String, String)>>,
        media: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PublicationSink for RecordingSink {
        async fn publish_text(&self, display_name: &str, text: &str) -> Result<(), PublishError> {
            self.texts
                .lock()
                .expect("sink mutex")
                .push((display_name.to_string(), text.to_string()));
            Ok(())
        }

        async fn publish_media(
            &self,
            display_name: &str,
            item: &PendingItem,
        ) -> Result<(), PublishError> {
            self.media
                .lock()
                .expect("sink mutex")
                .push((display_name.to_string(), item.id.clone()));
            Ok(())
        }
    }

    struct GuestDirectory;

    #[async_trait]
    impl UserDirectory for GuestDirectory {
        async fn display_name(&self, user_id: u64) -> String {
            format!("guest-{user_id}")
        }
    }

    struct Fixture {
        service: ContentService<InMemoryMediaStore>,
        queue: Arc<ModerationQueue<InMemoryMediaStore>>,
        sink: Arc<RecordingSink>,
    }

    async fn fixture(max_text_len: usize, max_pending_per_user: usize) -> Fixture {
        let doc = LexiconDocument {
            english: vec![WordSpec::Plain("darn".to_string())],
            ..Default::default()
        };
        let lexicon = Arc::new(
            LexiconStore::load(
                Box::new(FixedSource(doc)),
                LexiconStore::default_substitutions(),
            )
            .await
            .expect("lexicon compiles"),
        );
        let screener = Arc::new(ScreeningService::new(lexicon));
        let (queue, _events) = ModerationQueue::new(InMemoryMediaStore::new(), 100);
        let queue = Arc::new(queue);
        let sink = Arc::new(RecordingSink::default());

        let service = ContentService::new(
            Arc::clone(&screener),
            Arc::clone(&queue),
            Arc::new(GuestDirectory),
            Arc::clone(&sink) as Arc<dyn PublicationSink>,
            max_text_len,
            max_pending_per_user,
            true,
        );

        Fixture {
            service,
            queue,
            sink,
        }
    }

    #[tokio::test]
    async fn clean_text_is_published_with_display_name() {
        let fx = fixture(100, 5).await;

        let outcome = fx.service.submit_text(7, "hello channel").await.unwrap();
        assert_eq!(
            outcome,
            TextOutcome::Published {
                display_name: "guest-7".to_string()
            }
        );

        let texts = fx.sink.texts.lock().unwrap();
        assert_eq!(
            texts.as_slice(),
            &[("guest-7".to_string(), "hello channel".to_string())]
        );
    }

    #[tokio::test]
    async fn profane_text_is_refused_and_not_published() {
        let fx = fixture(100, 5).await;

        let outcome = fx.service.submit_text(7, "darn it all").await.unwrap();
        assert!(matches!(
            outcome,
            TextOutcome::Refused(TextRefusal::Profanity { .. })
        ));
        assert!(fx.sink.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlong_text_never_reaches_the_screener_or_channel() {
        let fx = fixture(10, 5).await;

        let outcome = fx
            .service
            .submit_text(7, "this is definitely longer than ten characters")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            TextOutcome::Refused(TextRefusal::TooLong { max: 10, .. })
        ));
        assert!(fx.sink.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_with_clean_caption_is_queued() {
        let fx = fixture(100, 5).await;

        let outcome = fx
            .service
            .submit_media(
                NewSubmission::new(7, "file-1", MediaKind::Photo).with_caption("nice sunset"),
            )
            .await
            .unwrap();

        let MediaOutcome::Queued { id } = outcome else {
            panic!("expected queued outcome, got {outcome:?}");
        };
        let item = fx.queue.get(&id).await.unwrap().unwrap();
        assert_eq!(item.caption.as_deref(), Some("nice sunset"));
    }

    #[tokio::test]
    async fn media_with_profane_caption_is_refused() {
        let fx = fixture(100, 5).await;

        let outcome = fx
            .service
            .submit_media(
                NewSubmission::new(7, "file-1", MediaKind::Photo).with_caption("darn picture"),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MediaOutcome::Refused(MediaRefusal::CaptionProfanity { .. })
        ));
        assert!(fx.queue.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn per_user_pending_cap_is_enforced() {
        let fx = fixture(100, 2).await;

        for i in 0..2 {
            let outcome = fx
                .service
                .submit_media(NewSubmission::new(7, format!("file-{i}"), MediaKind::Photo))
                .await
                .unwrap();
            assert!(matches!(outcome, MediaOutcome::Queued { .. }));
        }

        let outcome = fx
            .service
            .submit_media(NewSubmission::new(7, "file-3", MediaKind::Photo))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MediaOutcome::Refused(MediaRefusal::TooManyPending { pending: 2, max: 2 })
        ));

        // Other users are unaffected.
        let outcome = fx
            .service
            .submit_media(NewSubmission::new(8, "file-4", MediaKind::Photo))
            .await
            .unwrap();
        assert!(matches!(outcome, MediaOutcome::Queued { .. }));
    }

    #[tokio::test]
    async fn queue_capacity_maps_to_a_refusal() {
        let doc = LexiconDocument::default();
        let lexicon = Arc::new(
            LexiconStore::load(Box::new(FixedSource(doc)), vec![])
                .await
                .unwrap(),
        );
        let (queue, _events) = ModerationQueue::new(InMemoryMediaStore::new(), 1);
        let queue = Arc::new(queue);
        let service = ContentService::new(
            Arc::new(ScreeningService::new(lexicon)),
            Arc::clone(&queue),
            Arc::new(GuestDirectory),
            Arc::new(RecordingSink::default()),
            100,
            5,
            true,
        );

        let first = service
            .submit_media(NewSubmission::new(1, "file-1", MediaKind::Photo))
            .await
            .unwrap();
        assert!(matches!(first, MediaOutcome::Queued { .. }));

        let second = service
            .submit_media(NewSubmission::new(2, "file-2", MediaKind::Photo))
            .await
            .unwrap();
        assert!(matches!(
            second,
            MediaOutcome::Refused(MediaRefusal::QueueFull { capacity: 1 })
        ));
    }

    #[tokio::test]
    async fn approved_media_is_published_with_display_name() {
        let fx = fixture(100, 5).await;

        let outcome = fx
            .service
            .submit_media(NewSubmission::new(7, "file-1", MediaKind::Video))
            .await
            .unwrap();
        let MediaOutcome::Queued { id } = outcome else {
            panic!("expected queued outcome");
        };

        let item = fx.queue.decide(&id, Decision::Approve, 99).await.unwrap();
        fx.service.publish_approved(&item).await.unwrap();

        let media = fx.sink.media.lock().unwrap();
        assert_eq!(media.as_slice(), &[("guest-7".to_string(), id)]);
    }
}
