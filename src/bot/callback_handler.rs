//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error};

use super::message_handler::sender_from_user;
use crate::router::{InboundCallback, InboundEvent, Router};

/// Handle callback queries from the unban request buttons
pub async fn callback_handler(bot: Bot, q: CallbackQuery, router: Arc<Router>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Answer the callback query to remove the loading state
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        error!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let callback = InboundCallback {
        origin_chat: q.message.as_ref().map(|msg| msg.chat().id.0),
        from: sender_from_user(&q.from),
        data: q.data.clone(),
    };

    router.dispatch(InboundEvent::Callback(callback)).await;
    Ok(())
}
