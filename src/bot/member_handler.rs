//! Chat member handler: members kicked from the main chat are banned here too

use anyhow::Result;
use std::sync::Arc;
use teloxide::types::ChatMemberUpdated;
use tracing::debug;

use super::message_handler::sender_from_user;
use crate::router::{InboundEvent, Router};

pub async fn member_handler(update: ChatMemberUpdated, router: Arc<Router>) -> Result<()> {
    let member = &update.new_chat_member;
    if !member.kind.is_banned() {
        debug!(user_id = %member.user.id, "Ignoring membership change");
        return Ok(());
    }

    router
        .dispatch(InboundEvent::MemberKicked(sender_from_user(&member.user)))
        .await;
    Ok(())
}
