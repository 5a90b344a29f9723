//! Framework-neutral update routing.
//!
//! The teloxide adapter converts every update into an [`InboundEvent`];
//! [`Router::route`] decides which handler owns it and
//! [`Router::dispatch`] runs that handler.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::aggregator::MediaGroupAggregator;
use crate::config::BotConfig;
use crate::db::BanStore;
use crate::localization::Texts;
use crate::messenger::{MediaKind, MediaPart, Messenger, Sender};
use crate::moderation::Moderation;
use crate::relay::SurveyRelay;
use crate::text_processing::{command_arguments, leading_command};

/// Attachment carried by an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMedia {
    pub kind: MediaKind,
    pub media_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub sender: Sender,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<InboundMedia>,
    pub group_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundCallback {
    /// Chat of the message the pressed button belongs to
    pub origin_chat: Option<i64>,
    pub from: Sender,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InboundEvent {
    Message(InboundMessage),
    /// A member of the main chat got the "kicked" status
    MemberKicked(Sender),
    Callback(InboundCallback),
}

/// Bot commands recognized in message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Survey,
    Answer,
    Ban,
    Unban,
    ListBans,
    UnbanRequest,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match leading_command(text)?.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "survey" => Some(Self::Survey),
            "answer" => Some(Self::Answer),
            "ban" => Some(Self::Ban),
            "unban" => Some(Self::Unban),
            "list_bans" => Some(Self::ListBans),
            "unban_request" => Some(Self::UnbanRequest),
            _ => None,
        }
    }
}

/// Handler selected for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    Survey,
    Media,
    MediaGroupPart,
    Unsupported,
    MemberKicked,
    UnbanDecision,
    Ignore,
}

pub struct Router {
    relay: Arc<SurveyRelay>,
    moderation: Arc<Moderation>,
    aggregator: MediaGroupAggregator,
}

impl Router {
    pub fn new(
        relay: Arc<SurveyRelay>,
        moderation: Arc<Moderation>,
        aggregator: MediaGroupAggregator,
    ) -> Self {
        Self {
            relay,
            moderation,
            aggregator,
        }
    }

    /// Wire the relay, moderation and aggregator around one messenger
    pub fn assemble(
        config: Arc<BotConfig>,
        bans: BanStore,
        messenger: Arc<dyn Messenger>,
        texts: Texts,
    ) -> Self {
        let relay = Arc::new(SurveyRelay::new(messenger, bans.clone(), config, texts));
        let moderation = Arc::new(Moderation::new(Arc::clone(&relay), bans));
        let aggregator = MediaGroupAggregator::new(Arc::clone(&relay));
        Self::new(relay, moderation, aggregator)
    }

    pub fn aggregator(&self) -> &MediaGroupAggregator {
        &self.aggregator
    }

    pub fn route(event: &InboundEvent) -> Route {
        let msg = match event {
            InboundEvent::MemberKicked(_) => return Route::MemberKicked,
            InboundEvent::Callback(_) => return Route::UnbanDecision,
            InboundEvent::Message(msg) => msg,
        };

        if let Some(command) = msg.text.as_deref().and_then(Command::parse) {
            return Route::Command(command);
        }

        // Only private chats carry submissions; a private chat id equals the user id
        if msg.chat_id != msg.sender.id {
            return Route::Ignore;
        }

        if msg.text.is_some() {
            return Route::Survey;
        }

        if msg
            .caption
            .as_deref()
            .is_some_and(|caption| caption.contains("unban_request"))
        {
            return Route::Ignore;
        }

        match (&msg.media, &msg.group_key) {
            (Some(_), Some(_)) => Route::MediaGroupPart,
            (Some(_), None) => Route::Media,
            (None, _) => Route::Unsupported,
        }
    }

    /// Run the handler selected by [`Router::route`]
    pub async fn dispatch(&self, event: InboundEvent) {
        let route = Self::route(&event);
        debug!(route = ?route, "Routing update");

        match event {
            InboundEvent::MemberKicked(member) => self.moderation.member_kicked(&member).await,
            InboundEvent::Callback(callback) => {
                self.moderation
                    .unban_decision(callback.origin_chat, callback.data.as_deref())
                    .await
            }
            InboundEvent::Message(msg) => self.dispatch_message(route, msg).await,
        }
    }

    async fn dispatch_message(&self, route: Route, msg: InboundMessage) {
        let text = msg.text.as_deref().unwrap_or_default();

        match route {
            Route::Command(Command::Start) => self.moderation.start(msg.chat_id).await,
            Route::Command(Command::Survey) | Route::Survey => {
                self.relay.submit_text(&msg.sender, text).await
            }
            Route::Command(Command::Answer) => {
                self.moderation
                    .answer(msg.chat_id, command_arguments(text))
                    .await
            }
            Route::Command(Command::Ban) => {
                self.moderation
                    .ban_command(msg.chat_id, command_arguments(text))
                    .await
            }
            Route::Command(Command::Unban) => {
                self.moderation
                    .unban_command(msg.chat_id, command_arguments(text))
                    .await
            }
            Route::Command(Command::ListBans) => self.moderation.list_bans(msg.chat_id).await,
            Route::Command(Command::UnbanRequest) => {
                self.moderation.unban_request(&msg.sender, text).await
            }
            Route::Media => {
                if let Some(part) = media_part(&msg) {
                    self.relay.submit_media(&msg.sender, part).await;
                }
            }
            Route::MediaGroupPart => {
                let (Some(part), Some(group_key)) = (media_part(&msg), msg.group_key.as_deref())
                else {
                    return;
                };
                if self.relay.reject_if_banned(&msg.sender).await {
                    return;
                }
                self.aggregator.push(group_key, part).await;
            }
            Route::Unsupported => {
                debug!(user_id = msg.sender.id, "Unsupported message type");
                self.relay
                    .notify(msg.chat_id, &self.relay.texts().t("unsupported-media"))
                    .await;
            }
            Route::MemberKicked | Route::UnbanDecision | Route::Ignore => {}
        }
    }
}

fn media_part(msg: &InboundMessage) -> Option<MediaPart> {
    let media = msg.media.as_ref()?;
    Some(MediaPart {
        media_kind: media.kind,
        media_ref: media.media_ref.clone(),
        caption: msg.caption.clone(),
        sender_id: msg.sender.id,
        sender_username: msg.sender.username.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/survey@HeartsBot text"), Some(Command::Survey));
        assert_eq!(Command::parse("/list_bans"), Some(Command::ListBans));
        assert_eq!(Command::parse("/unban_request please"), Some(Command::UnbanRequest));
        assert_eq!(Command::parse("/unban 5"), Some(Command::Unban));
        assert_eq!(Command::parse("/help"), None);
        assert_eq!(Command::parse("hello"), None);
    }
}
