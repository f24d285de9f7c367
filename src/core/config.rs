// Runtime configuration for the bot core.
//
// All values are read from the environment exactly once at startup and handed
// to the services as plain fields. Core modules never touch env vars
// themselves, which keeps them trivially testable.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Validated configuration for the moderation core.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Channel the anonymized content is broadcast to.
    pub channel_id: String,
    /// Primary admin plus any additional moderators.
    pub admin_ids: Vec<u64>,
    /// Upper bound on items sitting in the moderation queue.
    pub max_pending_media: usize,
    /// Per-user bound on undecided submissions.
    pub max_pending_per_user: usize,
    /// Longest text message accepted for screening (in characters).
    pub max_text_len: usize,
    /// Strict screening also flags substrings and obfuscated variants.
    pub strict_screening: bool,
    /// Path to the word-list JSON file.
    pub lexicon_path: String,
    /// SQLite file holding the moderation queue.
    pub queue_db_path: String,
    /// Age after which decided items are swept from durable storage.
    pub purge_after: Duration,
}

impl BotConfig {
    /// Read and validate the configuration from the environment.
    ///
    /// Fails fast with a `ConfigError` instead of letting a bad value surface
    /// deep inside request handling.
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel_id = require_var("CHANNEL_ID")?;

        let mut admin_ids = vec![parse_var::<u64>("ADMIN_USER_ID", None)?
            .ok_or(ConfigError::MissingVar("ADMIN_USER_ID"))?];
        if let Ok(extra) = std::env::var("ADDITIONAL_ADMIN_IDS") {
            for part in extra.split(',').filter(|p| !p.trim().is_empty()) {
                let id = part
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidVar {
                        var: "ADDITIONAL_ADMIN_IDS",
                        reason: e.to_string(),
                    })?;
                admin_ids.push(id);
            }
        }

        let purge_after_days = parse_var::<u64>("PURGE_AFTER_DAYS", Some(7))?.unwrap_or(7);
        let purge_after_secs =
            purge_after_days
                .checked_mul(24 * 60 * 60)
                .ok_or(ConfigError::InvalidVar {
                    var: "PURGE_AFTER_DAYS",
                    reason: "value too large".to_string(),
                })?;

        let config = Self {
            channel_id,
            admin_ids,
            max_pending_media: parse_var("MAX_PENDING_MEDIA", Some(100))?.unwrap_or(100),
            max_pending_per_user: parse_var("MAX_PENDING_PER_USER", Some(5))?.unwrap_or(5),
            max_text_len: parse_var("MAX_MESSAGE_LENGTH", Some(4096))?.unwrap_or(4096),
            strict_screening: std::env::var("STRICT_FILTERING")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            lexicon_path: std::env::var("LEXICON_FILE")
                .unwrap_or_else(|_| "data/profanity_words.json".to_string()),
            queue_db_path: std::env::var("QUEUE_DB_FILE")
                .unwrap_or_else(|_| "data/moderation_queue.db".to_string()),
            purge_after: Duration::from_secs(purge_after_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_id.trim().is_empty() {
            return Err(ConfigError::MissingVar("CHANNEL_ID"));
        }
        if self.admin_ids.is_empty() || self.admin_ids.contains(&0) {
            return Err(ConfigError::InvalidVar {
                var: "ADMIN_USER_ID",
                reason: "at least one non-zero admin id is required".to_string(),
            });
        }
        if self.max_pending_media == 0 {
            return Err(ConfigError::InvalidVar {
                var: "MAX_PENDING_MEDIA",
                reason: "capacity must be at least 1".to_string(),
            });
        }
        if self.max_text_len == 0 {
            return Err(ConfigError::InvalidVar {
                var: "MAX_MESSAGE_LENGTH",
                reason: "maximum text length must be at least 1".to_string(),
            });
        }
        // 100 years. Keeps downstream duration conversions in range.
        if self.purge_after > Duration::from_secs(36_500 * 24 * 60 * 60) {
            return Err(ConfigError::InvalidVar {
                var: "PURGE_AFTER_DAYS",
                reason: "must be at most 36500 days".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the given user may approve or reject queued media.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn require_var(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(var)),
    }
}

/// Parse an optional env var, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    default: Option<T>,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidVar {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}
