//! # Configuration Module
//!
//! This module defines the configuration structures for the survey bot:
//! destination chats and credentials sourced from the environment, plus
//! delivery limits with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

// Constants for delivery configuration
pub const DEFAULT_DATABASE_URL: &str = "sqlite://banned.db?mode=rwc";
pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_FLUSH_DELAY_SECS: u64 = 30;
pub const CHUNK_SIZE: usize = 1900;
pub const MEDIA_CAPTION_LIMIT: usize = 1024;
pub const DEFAULT_LOG_FILE: &str = "survey_bot.log";
pub const DEFAULT_LOG_FILE_MAX_BYTES: u64 = 50_000_000;
pub const DEFAULT_LOG_FILE_BACKUPS: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 100;
pub const DEFAULT_POLLING_TIMEOUT_SECS: u64 = 120;

/// Delivery limits used by the relay and the aggregator
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Maximum characters per relayed text message
    pub chunk_size: usize,
    /// Maximum characters of a media caption accepted by Telegram
    pub caption_limit: usize,
    /// Retries after the first timed out attempt of a chunk
    pub max_retries: u32,
    /// Fixed pause between retries
    pub retry_delay: Duration,
    /// Maximum attachments accepted in one media group
    pub max_group_parts: usize,
    /// Maximum characters kept from an unban request
    pub unban_request_limit: usize,
    /// Aggregation window measured from the first part of a media group
    pub flush_delay: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            caption_limit: MEDIA_CAPTION_LIMIT,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            max_group_parts: 3,
            unban_request_limit: CHUNK_SIZE,
            flush_delay: Duration::from_secs(DEFAULT_FLUSH_DELAY_SECS),
        }
    }
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Size-rotated log file written next to the console output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileConfig {
    /// `None` disables the file sink
    pub path: Option<PathBuf>,
    pub max_bytes: u64,
    /// Rotated files kept besides the active one
    pub backups: usize,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            max_bytes: DEFAULT_LOG_FILE_MAX_BYTES,
            backups: DEFAULT_LOG_FILE_BACKUPS,
        }
    }
}

/// HTTP timeouts of the Bot API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramTimeouts {
    /// Text messages, buttons and callback answers
    pub request: Duration,
    /// Uploads of photos, videos, audio and documents
    pub media: Duration,
    /// Long polling wait passed to `getUpdates`
    pub polling: Duration,
}

impl Default for TelegramTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            media: Duration::from_secs(DEFAULT_MEDIA_TIMEOUT_SECS),
            polling: Duration::from_secs(DEFAULT_POLLING_TIMEOUT_SECS),
        }
    }
}

/// Bot configuration shared by every component
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// Review channel receiving surveys and staff commands
    pub survey_chat: i64,
    /// Channel receiving unban requests with Accept/Reject buttons
    pub unban_requests_chat: i64,
    /// Main community chat watched for kicked members
    pub main_chat: i64,
    /// Maintainer receiving diagnostics
    pub maintainer: i64,
    /// sqlx connection string of the ban store
    pub database_url: String,
    /// Locale of bot texts
    pub language: String,
    pub log_format: LogFormat,
    pub log_file: LogFileConfig,
    pub timeouts: TelegramTimeouts,
    pub delivery: DeliveryConfig,
}

impl BotConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use survey_bot::config::BotConfig;
    ///
    /// let vars: HashMap<&str, &str> = HashMap::from([
    ///     ("TELEGRAM_BOT_TOKEN", "123:abc"),
    ///     ("SURVEY_CHAT_ID", "-1001"),
    ///     ("UNBAN_REQUESTS_CHAT_ID", "-1002"),
    ///     ("MAIN_CHAT_ID", "-1003"),
    ///     ("MAINTAINER_ID", "42"),
    /// ]);
    /// let config = BotConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))?;
    /// assert_eq!(config.survey_chat, -1001);
    /// # Ok::<(), survey_bot::errors::ConfigError>(())
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let chat_id = |key: &'static str| -> Result<i64, ConfigError> {
            let value = required(key)?;
            value
                .parse::<i64>()
                .map_err(|_| ConfigError::Invalid { key, value })
        };

        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid { key, value }),
                None => Ok(default),
            }
        };

        let delivery = DeliveryConfig {
            flush_delay: Duration::from_secs(number(
                "MEDIA_GROUP_FLUSH_SECS",
                DEFAULT_FLUSH_DELAY_SECS,
            )?),
            ..DeliveryConfig::default()
        };

        let timeouts = TelegramTimeouts {
            request: Duration::from_secs(number(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            media: Duration::from_secs(number("MEDIA_TIMEOUT_SECS", DEFAULT_MEDIA_TIMEOUT_SECS)?),
            polling: Duration::from_secs(number(
                "POLLING_TIMEOUT_SECS",
                DEFAULT_POLLING_TIMEOUT_SECS,
            )?),
        };

        // An empty LOG_FILE turns the file sink off
        let log_file = LogFileConfig {
            path: match lookup("LOG_FILE") {
                Some(value) if value.trim().is_empty() => None,
                Some(value) => Some(PathBuf::from(value.trim())),
                None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
            },
            max_bytes: number("LOG_FILE_MAX_BYTES", DEFAULT_LOG_FILE_MAX_BYTES)?,
            backups: number("LOG_FILE_BACKUPS", DEFAULT_LOG_FILE_BACKUPS as u64)? as usize,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            token: required("TELEGRAM_BOT_TOKEN")?,
            survey_chat: chat_id("SURVEY_CHAT_ID")?,
            unban_requests_chat: chat_id("UNBAN_REQUESTS_CHAT_ID")?,
            main_chat: chat_id("MAIN_CHAT_ID")?,
            maintainer: chat_id("MAINTAINER_ID")?,
            database_url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            language: lookup("BOT_LANGUAGE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            log_format,
            log_file,
            timeouts,
            delivery,
        })
    }
}
