//! Outbound messaging port.
//!
//! Services talk to Telegram only through the [`Messenger`] trait so they can
//! be exercised without a live bot. [`TelegramMessenger`] is the production
//! implementation on top of teloxide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InputFile, InputMedia, InputMediaAudio, InputMediaDocument, InputMediaPhoto,
    InputMediaVideo,
};
use teloxide::RequestError;
use tracing::debug;

use crate::bot::ui_builder::build_inline_keyboard;
use crate::errors::SendError;

/// Author of an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
}

/// One attachment of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPart {
    pub media_kind: MediaKind,
    /// Platform file id, reusable for re-sending without download
    pub media_ref: String,
    pub caption: Option<String>,
    pub sender_id: i64,
    pub sender_username: Option<String>,
}

impl MediaPart {
    pub fn sender(&self) -> Sender {
        Sender {
            id: self.sender_id,
            username: self.sender_username.clone(),
        }
    }
}

/// Inline button carrying a callback payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError>;

    async fn send_media(
        &self,
        chat_id: i64,
        part: &MediaPart,
        caption: Option<&str>,
    ) -> Result<(), SendError>;

    /// Send all parts as one album; `caption` goes on the first item
    async fn send_media_group(
        &self,
        chat_id: i64,
        parts: &[MediaPart],
        caption: Option<&str>,
    ) -> Result<(), SendError>;

    async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[Vec<InlineButton>],
    ) -> Result<(), SendError>;
}

/// Map a teloxide request error onto the delivery taxonomy
pub fn classify_request_error(err: &RequestError) -> SendError {
    match err {
        RequestError::Network(e) if e.is_timeout() => SendError::Timeout(e.to_string()),
        RequestError::Network(e) => SendError::Network(e.to_string()),
        RequestError::Api(api) => {
            let message = api.to_string();
            if message.to_lowercase().contains("caption is too long") {
                SendError::CaptionTooLong
            } else {
                SendError::Api(message)
            }
        }
        other => SendError::Api(other.to_string()),
    }
}

fn input_file(part: &MediaPart) -> InputFile {
    InputFile::file_id(FileId(part.media_ref.clone()))
}

fn input_media(part: &MediaPart, caption: Option<&str>) -> InputMedia {
    let caption = caption.map(str::to_string);
    match part.media_kind {
        MediaKind::Photo => {
            let mut media = InputMediaPhoto::new(input_file(part));
            media.caption = caption;
            InputMedia::Photo(media)
        }
        MediaKind::Video => {
            let mut media = InputMediaVideo::new(input_file(part));
            media.caption = caption;
            InputMedia::Video(media)
        }
        MediaKind::Audio => {
            let mut media = InputMediaAudio::new(input_file(part));
            media.caption = caption;
            InputMedia::Audio(media)
        }
        MediaKind::Document => {
            let mut media = InputMediaDocument::new(input_file(part));
            media.caption = caption;
            InputMedia::Document(media)
        }
    }
}

/// [`Messenger`] backed by teloxide [`Bot`]s
///
/// Uploads go through `media_bot`, whose client allows a longer timeout.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    media_bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, media_bot: Bot) -> Self {
        Self { bot, media_bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| classify_request_error(&e))
    }

    async fn send_media(
        &self,
        chat_id: i64,
        part: &MediaPart,
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        debug!(chat_id, kind = ?part.media_kind, "Sending single media post");
        let chat = ChatId(chat_id);
        let file = input_file(part);
        let caption = caption.unwrap_or_default().to_string();

        let result = match part.media_kind {
            MediaKind::Photo => self.media_bot.send_photo(chat, file).caption(caption).await,
            MediaKind::Video => self.media_bot.send_video(chat, file).caption(caption).await,
            MediaKind::Audio => self.media_bot.send_audio(chat, file).caption(caption).await,
            MediaKind::Document => self.media_bot.send_document(chat, file).caption(caption).await,
        };

        result.map(|_| ()).map_err(|e| classify_request_error(&e))
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        parts: &[MediaPart],
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        debug!(chat_id, parts = parts.len(), "Sending media group");
        let media: Vec<InputMedia> = parts
            .iter()
            .enumerate()
            .map(|(i, part)| input_media(part, if i == 0 { caption } else { None }))
            .collect();

        self.media_bot
            .send_media_group(ChatId(chat_id), media)
            .await
            .map(|_| ())
            .map_err(|e| classify_request_error(&e))
    }

    async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[Vec<InlineButton>],
    ) -> Result<(), SendError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(build_inline_keyboard(buttons))
            .await
            .map(|_| ())
            .map_err(|e| classify_request_error(&e))
    }
}
