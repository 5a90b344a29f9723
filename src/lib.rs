//! # Survey Telegram Bot
//!
//! A Telegram bot that relays membership applications and their attachments
//! to a review channel, keeps a ban list, and handles one-time unban appeals.

pub mod aggregator;
pub mod bot;
pub mod config;
pub mod db;
pub mod errors;
pub mod localization;
pub mod logging;
pub mod messenger;
pub mod moderation;
pub mod relay;
pub mod router;
pub mod text_processing;
