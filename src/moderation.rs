//! Moderation commands, unban requests and their approval buttons.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::{BanRecord, BanStore};
use crate::errors::PayloadError;
use crate::messenger::{InlineButton, Sender};
use crate::relay::SurveyRelay;
use crate::text_processing::{parse_chat_id, split_into_chunks, strip_command, truncate_chars};

const UNBAN_PAYLOAD_PREFIX: &str = "unban";

/// Staff decision carried by an unban request button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbanDecision {
    Accept(i64),
    Reject(i64),
}

impl UnbanDecision {
    /// Parse payloads of the form `unban_accept_<id>` / `unban_reject_<id>`
    pub fn parse(data: &str) -> Result<Self, PayloadError> {
        let mut fields = data.splitn(3, '_');
        let (prefix, decision, user_id) = match (fields.next(), fields.next(), fields.next()) {
            (Some(prefix), Some(decision), Some(user_id)) => (prefix, decision, user_id),
            _ => return Err(PayloadError::UnknownPrefix(data.to_string())),
        };

        if prefix != UNBAN_PAYLOAD_PREFIX {
            return Err(PayloadError::UnknownPrefix(data.to_string()));
        }

        let user_id = user_id
            .parse::<i64>()
            .map_err(|_| PayloadError::InvalidUserId(user_id.to_string()))?;

        match decision {
            "accept" => Ok(Self::Accept(user_id)),
            "reject" => Ok(Self::Reject(user_id)),
            other => Err(PayloadError::UnknownDecision(other.to_string())),
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Self::Accept(id) => format!("{UNBAN_PAYLOAD_PREFIX}_accept_{id}"),
            Self::Reject(id) => format!("{UNBAN_PAYLOAD_PREFIX}_reject_{id}"),
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            Self::Accept(id) | Self::Reject(id) => *id,
        }
    }
}

/// Staff and ban-related handlers
pub struct Moderation {
    relay: Arc<SurveyRelay>,
    bans: BanStore,
}

impl Moderation {
    pub fn new(relay: Arc<SurveyRelay>, bans: BanStore) -> Self {
        Self { relay, bans }
    }

    fn survey_chat(&self) -> i64 {
        self.relay.config().survey_chat
    }

    fn is_staff_chat(&self, chat_id: i64) -> bool {
        chat_id == self.survey_chat()
    }

    async fn reply_staff(&self, text: &str) {
        self.relay.notify(self.survey_chat(), text).await;
    }

    fn t(&self, key: &str) -> String {
        self.relay.texts().t(key)
    }

    fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.relay.texts().t_args(key, args)
    }

    /// Parse the id argument of `/ban` and `/unban`, replying on bad input
    async fn parse_target(&self, args: &str, usage_key: &str) -> Option<i64> {
        let arg = args.split_whitespace().next();
        match arg {
            None => {
                self.reply_staff(&self.t(usage_key)).await;
                None
            }
            Some(arg) => match parse_chat_id(arg) {
                Some(id) => Some(id),
                None => {
                    debug!(arg, "Rejecting non-numeric user id");
                    self.reply_staff(&self.t("id-not-numeric")).await;
                    None
                }
            },
        }
    }

    pub async fn start(&self, chat_id: i64) {
        debug!(chat_id, "Start command");
        self.relay.notify(chat_id, &self.t("welcome")).await;
    }

    /// `/ban <id>` issued in the review channel
    pub async fn ban_command(&self, source_chat: i64, args: &str) {
        if !self.is_staff_chat(source_chat) {
            return;
        }
        let Some(user_id) = self.parse_target(args, "ban-usage").await else {
            return;
        };

        let id = user_id.to_string();
        if self.bans.ban(user_id, None).await {
            self.reply_staff(&self.t_args("user-banned", &[("id", &id)])).await;
            self.send_ban_notice(user_id).await;
        } else {
            self.reply_staff(&self.t_args("ban-failed", &[("id", &id)])).await;
        }
    }

    /// `/unban <id>` issued in the review channel
    pub async fn unban_command(&self, source_chat: i64, args: &str) {
        if !self.is_staff_chat(source_chat) {
            return;
        }
        let Some(user_id) = self.parse_target(args, "unban-usage").await else {
            return;
        };

        let id = user_id.to_string();
        if self.bans.unban(user_id).await {
            self.reply_staff(&self.t_args("user-unbanned", &[("id", &id)])).await;
        } else {
            self.reply_staff(&self.t_args("unban-failed", &[("id", &id)])).await;
        }
    }

    /// `/list_bans` issued in the review channel
    pub async fn list_bans(&self, source_chat: i64) {
        if !self.is_staff_chat(source_chat) {
            return;
        }

        let records = self.bans.list_all().await;
        let mut text = self.t("ban-list-header");
        text.push('\n');
        if records.is_empty() {
            text.push_str(&self.t("ban-list-empty"));
        }
        for record in &records {
            text.push_str(&format_ban_line(record));
            text.push('\n');
        }

        for chunk in split_into_chunks(&text, self.relay.config().delivery.chunk_size) {
            self.reply_staff(&chunk).await;
        }
    }

    /// `/answer <id>\n<text>`: staff reply forwarded to an applicant
    pub async fn answer(&self, source_chat: i64, args: &str) {
        if !self.is_staff_chat(source_chat) {
            return;
        }

        let parsed = args
            .trim_start()
            .split_once('\n')
            .and_then(|(id, reply)| Some((parse_chat_id(id)?, reply.trim())))
            .filter(|(_, reply)| !reply.is_empty());
        let Some((user_id, reply)) = parsed else {
            self.reply_staff(&self.t("answer-usage")).await;
            return;
        };

        match self.relay.messenger().send_text(user_id, reply).await {
            Ok(()) => debug!(user_id, "Answered back to user"),
            Err(e) => {
                let id = user_id.to_string();
                self.reply_staff(&self.t_args("answer-failed", &[("id", &id)])).await;
                self.relay
                    .report_diagnostic(&format!("Error on survey answer for {user_id}: {e}\n{e:?}"))
                    .await;
            }
        }
    }

    /// A member was kicked from the main chat: ban them here too
    pub async fn member_kicked(&self, member: &Sender) {
        info!(user_id = member.id, "User banned in main chat");
        let id = member.id.to_string();
        let username = member.username.clone().unwrap_or_default();
        let args = [("id", id.as_str()), ("username", username.as_str())];

        if self.bans.ban(member.id, member.username.as_deref()).await {
            self.reply_staff(&self.t_args("member-banned", &args)).await;
            self.send_ban_notice(member.id).await;
        } else {
            self.reply_staff(&self.t_args("member-ban-failed", &args)).await;
        }
    }

    async fn send_ban_notice(&self, user_id: i64) {
        if let Err(e) = self
            .relay
            .messenger()
            .send_text(user_id, &self.t("ban-notice"))
            .await
        {
            warn!(user_id, error = %e, "Could not deliver ban notice");
        }
    }

    /// `/unban_request <text>` from a banned user
    pub async fn unban_request(&self, sender: &Sender, text: &str) {
        if !self.bans.is_banned(sender.id).await {
            debug!(user_id = sender.id, "Ignoring unban request from user who is not banned");
            return;
        }
        if self.bans.has_requested_unban(sender.id).await {
            self.relay.notify(sender.id, &self.t("unban-request-used")).await;
            return;
        }

        self.bans.mark_unban_requested(sender.id).await;

        let limit = self.relay.config().delivery.unban_request_limit;
        let body = truncate_chars(strip_command(text, "unban_request"), limit);
        let request = format!(
            "Unban request from user: {} {}\n{}",
            sender.id,
            sender.username.as_deref().unwrap_or_default(),
            body
        );
        let buttons = vec![vec![
            InlineButton::new(
                self.t("unban-accept-button"),
                UnbanDecision::Accept(sender.id).payload(),
            ),
            InlineButton::new(
                self.t("unban-reject-button"),
                UnbanDecision::Reject(sender.id).payload(),
            ),
        ]];

        let unban_chat = self.relay.config().unban_requests_chat;
        match self
            .relay
            .messenger()
            .send_with_buttons(unban_chat, &request, &buttons)
            .await
        {
            Ok(()) => {
                info!(user_id = sender.id, "Unban request posted");
                self.relay.notify(sender.id, &self.t("unban-request-sent")).await;
            }
            Err(e) => {
                self.relay
                    .report_failure(sender.id, &crate::relay::SubmissionContext::text(sender, text), &e)
                    .await
            }
        }
    }

    /// Accept/Reject button pressed on an unban request
    pub async fn unban_decision(&self, origin_chat: Option<i64>, data: Option<&str>) {
        let unban_chat = self.relay.config().unban_requests_chat;
        if origin_chat != Some(unban_chat) {
            warn!(origin_chat = ?origin_chat, "Ignoring unban decision outside the unban request chat");
            return;
        }

        let decision = match data.map(UnbanDecision::parse) {
            Some(Ok(decision)) => decision,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring malformed unban decision payload");
                return;
            }
            None => {
                warn!("Ignoring unban decision without payload");
                return;
            }
        };

        let user_id = decision.user_id();
        let id = user_id.to_string();
        match decision {
            UnbanDecision::Accept(_) => {
                if !self.bans.unban(user_id).await {
                    warn!(user_id, "Accepted unban request but the ban could not be removed");
                    self.relay
                        .notify(unban_chat, &self.t_args("unban-failed", &[("id", &id)]))
                        .await;
                    return;
                }
                self.relay.notify(user_id, &self.t("unban-accepted")).await;
                self.relay
                    .notify(unban_chat, &self.t_args("unban-resolved-accepted", &[("id", &id)]))
                    .await;
            }
            UnbanDecision::Reject(_) => {
                self.relay.notify(user_id, &self.t("unban-rejected")).await;
                self.relay
                    .notify(unban_chat, &self.t_args("unban-resolved-rejected", &[("id", &id)]))
                    .await;
            }
        }
        info!(user_id, decision = ?decision, "Unban request resolved");
    }
}

/// One line of the `/list_bans` output
pub fn format_ban_line(record: &BanRecord) -> String {
    format!(
        "{} | {} | tried unban: {}",
        record.chat_id,
        record.username.as_deref().unwrap_or("-"),
        record.tried_unban
    )
}
