//! Survey relay: forwards applicant submissions to the review channel.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::db::BanStore;
use crate::errors::{RelayError, SendError};
use crate::localization::Texts;
use crate::messenger::{MediaPart, Messenger, Sender};
use crate::text_processing::{format_submission, split_into_chunks, strip_command, telegram_len};

pub struct SurveyRelay {
    messenger: Arc<dyn Messenger>,
    bans: BanStore,
    config: Arc<BotConfig>,
    texts: Texts,
}

impl SurveyRelay {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        bans: BanStore,
        config: Arc<BotConfig>,
        texts: Texts,
    ) -> Self {
        Self {
            messenger,
            bans,
            config,
            texts,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn texts(&self) -> &Texts {
        &self.texts
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Send the blacklist notice when the sender is banned
    ///
    /// Returns `true` when the submission must be dropped.
    pub async fn reject_if_banned(&self, sender: &Sender) -> bool {
        if !self.bans.is_banned(sender.id).await {
            return false;
        }
        info!(user_id = sender.id, "Dropping submission from banned user");
        self.notify(sender.id, &self.texts.t("blacklisted")).await;
        true
    }

    /// Relay a text survey and acknowledge it
    pub async fn submit_text(&self, sender: &Sender, text: &str) {
        if self.reject_if_banned(sender).await {
            return;
        }

        let body = strip_command(text, "survey");
        let formatted = format_submission(body, sender, &self.texts.t("survey-tag"));

        match self.deliver_text(&formatted).await {
            Ok(()) => {
                self.acknowledge(sender.id).await;
                debug!(user_id = sender.id, "Text survey processed");
            }
            Err(e) => {
                self.report_failure(sender.id, &SubmissionContext::text(sender, text), &e)
                    .await
            }
        }
    }

    /// Relay a single attachment that is not part of a media group
    pub async fn submit_media(&self, sender: &Sender, part: MediaPart) {
        if self.reject_if_banned(sender).await {
            return;
        }

        let caption = format_submission(
            strip_command(part.caption.as_deref().unwrap_or_default(), "survey"),
            sender,
            &self.texts.t("survey-tag"),
        );

        match self
            .messenger
            .send_media(self.config.survey_chat, &part, Some(&caption))
            .await
        {
            Ok(()) => {
                self.acknowledge(sender.id).await;
                debug!(user_id = sender.id, kind = ?part.media_kind, "Media survey processed");
            }
            Err(SendError::CaptionTooLong) => {
                warn!(user_id = sender.id, "Media caption too long, asking to resend separately");
                self.notify(sender.id, &self.texts.t("caption-too-long")).await;
            }
            Err(e) => {
                let context = SubmissionContext::media(sender, std::slice::from_ref(&part));
                self.report_failure(sender.id, &context, &RelayError::Send(e))
                    .await
            }
        }
    }

    /// Post an assembled media group, then its caption if it did not fit
    pub async fn deliver_group(&self, sender: &Sender, parts: &[MediaPart], caption: &str) {
        match self.post_group(sender, parts, caption).await {
            Ok(()) => {
                self.acknowledge(sender.id).await;
                debug!(user_id = sender.id, parts = parts.len(), "Media group processed");
            }
            Err(e) => {
                self.report_failure(sender.id, &SubmissionContext::media(sender, parts), &e)
                    .await
            }
        }
    }

    /// Telegram may still refuse a caption that passed the length check;
    /// the album is then re-sent bare and the caption follows as text.
    async fn post_group(
        &self,
        sender: &Sender,
        parts: &[MediaPart],
        caption: &str,
    ) -> Result<(), RelayError> {
        let chat = self.config.survey_chat;
        let fits = !caption.is_empty() && telegram_len(caption) <= self.config.delivery.caption_limit;
        let attached = if fits { Some(caption) } else { None };

        match self.messenger.send_media_group(chat, parts, attached).await {
            Ok(()) if fits => return Ok(()),
            Ok(()) => {}
            Err(SendError::CaptionTooLong) if fits => {
                warn!(user_id = sender.id, "Album caption refused, sending it separately");
                self.messenger.send_media_group(chat, parts, None).await?;
            }
            Err(e) => return Err(e.into()),
        }
        self.deliver_text(caption).await
    }

    /// Deliver text to the review channel chunk by chunk, in order
    pub async fn deliver_text(&self, text: &str) -> Result<(), RelayError> {
        let chunks = split_into_chunks(text, self.config.delivery.chunk_size);
        for (index, chunk) in chunks.iter().enumerate() {
            self.send_chunk_with_retry(index, chunk).await?;
        }
        Ok(())
    }

    async fn send_chunk_with_retry(&self, index: usize, chunk: &str) -> Result<(), RelayError> {
        let delivery = &self.config.delivery;
        let chat = self.config.survey_chat;

        let mut last_err = match self.messenger.send_text(chat, chunk).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_timeout() => e,
            Err(e) => return Err(e.into()),
        };

        for attempt in 1..=delivery.max_retries {
            warn!(chunk = index, attempt, error = %last_err, "Review channel send timed out, retrying");
            sleep(delivery.retry_delay).await;
            match self.messenger.send_text(chat, chunk).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() => last_err = e,
                Err(e) => return Err(e.into()),
            }
        }

        error!(chunk = index, error = %last_err, "Giving up on review channel delivery");
        Err(RelayError::DeliveryTimeout {
            chunk: index,
            attempts: delivery.max_retries + 1,
        })
    }

    pub async fn acknowledge(&self, user_id: i64) {
        self.notify(user_id, &self.texts.t("survey-received")).await;
    }

    /// Best-effort message to a user; failures are only logged
    pub async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!(chat_id, error = %e, "Failed to send notice");
        }
    }

    /// Apologize to the user and forward a diagnostic to the maintainer
    pub async fn report_failure<C, E>(&self, user_id: i64, context: &C, err: &E)
    where
        C: Serialize + ?Sized,
        E: std::fmt::Debug + std::fmt::Display + ?Sized,
    {
        error!(user_id, error = %err, "Failed to process update");
        self.notify(user_id, &self.texts.t("unexpected-error")).await;

        let context_json = serde_json::to_string_pretty(context)
            .unwrap_or_else(|e| format!("<context not serializable: {e}>"));
        self.report_diagnostic(&format!(
            "Error on survey for {user_id}: {err}\n{err:?}\n{context_json}"
        ))
        .await;
    }

    /// Forward a diagnostic dump to the maintainer in chunks
    pub async fn report_diagnostic(&self, diagnostic: &str) {
        for chunk in split_into_chunks(diagnostic, self.config.delivery.chunk_size) {
            if let Err(e) = self.messenger.send_text(self.config.maintainer, &chunk).await {
                error!(error = %e, "Failed to deliver diagnostic to maintainer");
                break;
            }
        }
    }
}

/// Snapshot of a failing submission attached to diagnostics
#[derive(Debug, Serialize)]
pub struct SubmissionContext<'a> {
    pub sender: &'a Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "no_parts")]
    pub parts: &'a [MediaPart],
}

fn no_parts(parts: &&[MediaPart]) -> bool {
    parts.is_empty()
}

impl<'a> SubmissionContext<'a> {
    pub fn text(sender: &'a Sender, text: &'a str) -> Self {
        Self {
            sender,
            text: Some(text),
            parts: &[],
        }
    }

    pub fn media(sender: &'a Sender, parts: &'a [MediaPart]) -> Self {
        Self {
            sender,
            text: None,
            parts,
        }
    }
}
