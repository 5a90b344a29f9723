//! UI Builder module for creating inline keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::messenger::InlineButton;

/// Turn a grid of framework-neutral buttons into a Telegram inline keyboard
pub fn build_inline_keyboard(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    let buttons: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(button.label.clone(), button.payload.clone())
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(buttons)
}
