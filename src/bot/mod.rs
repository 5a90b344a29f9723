//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Converts incoming messages into router events
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `member_handler`: Watches the main chat for kicked members
//! - `ui_builder`: Creates inline keyboards

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatMemberUpdated};
use teloxide::update_listeners::Polling;

use crate::config::{BotConfig, TelegramTimeouts};

pub mod callback_handler;
pub mod member_handler;
pub mod message_handler;
pub mod ui_builder;

pub use callback_handler::callback_handler;
pub use member_handler::member_handler;
pub use message_handler::message_handler;

/// Dispatcher tree; expects `Arc<BotConfig>` and `Arc<Router>` as dependencies
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_chat_member()
                .filter(|update: ChatMemberUpdated, config: Arc<BotConfig>| {
                    update.chat.id.0 == config.main_chat
                })
                .endpoint(member_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler))
}

/// Bot whose HTTP client gives up after `timeout`
pub fn build_bot(token: &str, timeout: Duration) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()
        .context("Failed to build Bot API client")?;
    Ok(Bot::with_client(token, client))
}

/// Bot used by the dispatcher: its client outlives one long-polling wait
pub fn polling_bot(token: &str, timeouts: &TelegramTimeouts) -> Result<Bot> {
    build_bot(token, timeouts.polling + timeouts.request)
}

/// Long-polling listener; chat member updates must be requested explicitly
pub fn polling_listener(bot: Bot, timeouts: &TelegramTimeouts) -> Polling<Bot> {
    Polling::builder(bot)
        .timeout(timeouts.polling)
        .allowed_updates(vec![
            AllowedUpdate::Message,
            AllowedUpdate::CallbackQuery,
            AllowedUpdate::ChatMember,
        ])
        .build()
}
