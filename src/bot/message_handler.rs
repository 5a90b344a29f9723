//! Message Handler module for converting incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::debug;

use crate::messenger::{MediaKind, Sender};
use crate::router::{InboundEvent, InboundMedia, InboundMessage, Router};

pub fn sender_from_user(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
    }
}

/// Pick the attachment of a message, largest size for photos
fn extract_media(msg: &Message) -> Option<InboundMedia> {
    let (kind, file_id) = if let Some(photos) = msg.photo() {
        (MediaKind::Photo, &photos.last()?.file.id)
    } else if let Some(video) = msg.video() {
        (MediaKind::Video, &video.file.id)
    } else if let Some(audio) = msg.audio() {
        (MediaKind::Audio, &audio.file.id)
    } else if let Some(document) = msg.document() {
        (MediaKind::Document, &document.file.id)
    } else {
        return None;
    };

    Some(InboundMedia {
        kind,
        media_ref: file_id.0.clone(),
    })
}

/// Convert a teloxide message into a router event
pub fn inbound_message(msg: &Message) -> InboundMessage {
    // Anonymous posts have no author; answer the chat itself
    let sender = msg.from.as_ref().map(sender_from_user).unwrap_or(Sender {
        id: msg.chat.id.0,
        username: None,
    });

    InboundMessage {
        chat_id: msg.chat.id.0,
        sender,
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        media: extract_media(msg),
        group_key: msg.media_group_id().map(|id| id.0.clone()),
    }
}

pub async fn message_handler(msg: Message, router: Arc<Router>) -> Result<()> {
    let inbound = inbound_message(&msg);
    debug!(
        user_id = inbound.sender.id,
        chat_id = inbound.chat_id,
        has_media = inbound.media.is_some(),
        "Received message"
    );

    router.dispatch(InboundEvent::Message(inbound)).await;
    Ok(())
}
