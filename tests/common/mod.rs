//! Shared fixtures for the integration tests: a recording messenger and a
//! fully wired router backed by an in-memory ban store.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use survey_bot::config::BotConfig;
use survey_bot::db::BanStore;
use survey_bot::errors::SendError;
use survey_bot::localization::Texts;
use survey_bot::messenger::{InlineButton, MediaKind, MediaPart, Messenger, Sender};
use survey_bot::router::{InboundEvent, InboundMedia, InboundMessage, Router};

pub const SURVEY_CHAT: i64 = -100;
pub const UNBAN_CHAT: i64 = -200;
pub const MAIN_CHAT: i64 = -300;
pub const MAINTAINER: i64 = 999;

/// Everything a messenger was asked to send
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
    },
    Media {
        chat_id: i64,
        kind: MediaKind,
        media_ref: String,
        caption: Option<String>,
    },
    Group {
        chat_id: i64,
        media_refs: Vec<String>,
        caption: Option<String>,
    },
    Buttons {
        chat_id: i64,
        text: String,
        payloads: Vec<String>,
    },
}

impl Sent {
    pub fn chat_id(&self) -> i64 {
        match self {
            Sent::Text { chat_id, .. }
            | Sent::Media { chat_id, .. }
            | Sent::Group { chat_id, .. }
            | Sent::Buttons { chat_id, .. } => *chat_id,
        }
    }
}

/// Messenger fake recording successful sends; failures can be scripted per chat
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failures: Mutex<HashMap<i64, VecDeque<SendError>>>,
    attempts: Mutex<HashMap<i64, usize>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next send to `chat_id` fail with `err`
    pub fn fail_next(&self, chat_id: i64, err: SendError) {
        self.failures
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_default()
            .push_back(err);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat_id() == chat_id)
            .collect()
    }

    /// Texts sent to a chat, in order
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id)
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Send attempts to a chat, failed ones included
    pub fn attempts_to(&self, chat_id: i64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&chat_id)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, chat_id: i64, sent: Sent) -> Result<(), SendError> {
        *self.attempts.lock().unwrap().entry(chat_id).or_default() += 1;
        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&chat_id)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        self.record(
            chat_id,
            Sent::Text {
                chat_id,
                text: text.to_string(),
            },
        )
    }

    async fn send_media(
        &self,
        chat_id: i64,
        part: &MediaPart,
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        self.record(
            chat_id,
            Sent::Media {
                chat_id,
                kind: part.media_kind,
                media_ref: part.media_ref.clone(),
                caption: caption.map(str::to_string),
            },
        )
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        parts: &[MediaPart],
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        self.record(
            chat_id,
            Sent::Group {
                chat_id,
                media_refs: parts.iter().map(|p| p.media_ref.clone()).collect(),
                caption: caption.map(str::to_string),
            },
        )
    }

    async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[Vec<InlineButton>],
    ) -> Result<(), SendError> {
        self.record(
            chat_id,
            Sent::Buttons {
                chat_id,
                text: text.to_string(),
                payloads: buttons
                    .iter()
                    .flatten()
                    .map(|b| b.payload.clone())
                    .collect(),
            },
        )
    }
}

pub fn test_config() -> BotConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("TELEGRAM_BOT_TOKEN", "123:test".to_string()),
        ("SURVEY_CHAT_ID", SURVEY_CHAT.to_string()),
        ("UNBAN_REQUESTS_CHAT_ID", UNBAN_CHAT.to_string()),
        ("MAIN_CHAT_ID", MAIN_CHAT.to_string()),
        ("MAINTAINER_ID", MAINTAINER.to_string()),
        ("BOT_LANGUAGE", "en".to_string()),
    ]);
    let mut config = BotConfig::from_lookup(|key| vars.get(key).cloned())
        .expect("test config should be valid");
    // Keep real-time tests fast
    config.delivery.retry_delay = Duration::from_millis(10);
    config.delivery.flush_delay = Duration::from_millis(200);
    config
}

pub fn texts() -> Texts {
    Texts::load("en").expect("locales should load")
}

pub struct Harness {
    pub router: Router,
    pub messenger: Arc<RecordingMessenger>,
    pub bans: BanStore,
    pub texts: Texts,
}

pub async fn harness_with(config: BotConfig) -> Harness {
    let bans = BanStore::in_memory().await.expect("in-memory store");
    let messenger = RecordingMessenger::new();
    let texts = texts();
    let router = Router::assemble(
        Arc::new(config),
        bans.clone(),
        messenger.clone(),
        texts.clone(),
    );
    Harness {
        router,
        messenger,
        bans,
        texts,
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub fn user(id: i64, username: Option<&str>) -> Sender {
    Sender {
        id,
        username: username.map(str::to_string),
    }
}

/// Text message typed in a private chat with the bot
pub fn private_text(sender: &Sender, text: &str) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        chat_id: sender.id,
        sender: sender.clone(),
        text: Some(text.to_string()),
        caption: None,
        media: None,
        group_key: None,
    })
}

/// Text message posted in a group chat such as the review channel
pub fn chat_text(chat_id: i64, sender: &Sender, text: &str) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        chat_id,
        sender: sender.clone(),
        text: Some(text.to_string()),
        caption: None,
        media: None,
        group_key: None,
    })
}

pub fn private_media(
    sender: &Sender,
    kind: MediaKind,
    media_ref: &str,
    caption: Option<&str>,
    group_key: Option<&str>,
) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        chat_id: sender.id,
        sender: sender.clone(),
        text: None,
        caption: caption.map(str::to_string),
        media: Some(InboundMedia {
            kind,
            media_ref: media_ref.to_string(),
        }),
        group_key: group_key.map(str::to_string),
    })
}

pub fn media_part(sender: &Sender, media_ref: &str, caption: Option<&str>) -> MediaPart {
    MediaPart {
        media_kind: MediaKind::Photo,
        media_ref: media_ref.to_string(),
        caption: caption.map(str::to_string),
        sender_id: sender.id,
        sender_username: sender.username.clone(),
    }
}
