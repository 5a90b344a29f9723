//! # Text Processing Module
//!
//! This module provides the text utilities used when relaying submissions:
//! stripping command tokens, prefixing the sender banner and ordering tag,
//! and splitting long texts into chunks Telegram will accept.
//!
//! All lengths are counted in characters, not bytes, so Cyrillic surveys
//! split at the same positions as Latin ones.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::messenger::Sender;

// Leading command token, optionally addressed to a bot (`/survey@SomeBot`)
const COMMAND_PATTERN: &str = r"^\s*/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s+|$)";

lazy_static! {
    static ref COMMAND_REGEX: Regex =
        Regex::new(COMMAND_PATTERN).expect("Command pattern should be valid");
}

/// Return the command name if `text` starts with a bot command
///
/// # Examples
///
/// ```rust
/// use survey_bot::text_processing::leading_command;
///
/// assert_eq!(leading_command("/ban@SurveyBot 42"), Some("ban"));
/// assert_eq!(leading_command("hello"), None);
/// ```
pub fn leading_command(text: &str) -> Option<&str> {
    COMMAND_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Everything after the leading command token, or the whole text without one
pub fn command_arguments(text: &str) -> &str {
    match COMMAND_REGEX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Remove a leading `/command` token when it matches `command`
pub fn strip_command<'a>(text: &'a str, command: &str) -> &'a str {
    match leading_command(text) {
        Some(found) if found.eq_ignore_ascii_case(command) => command_arguments(text).trim(),
        _ => text.trim(),
    }
}

/// Prefix a submission with the sender banner and append the ordering tag
pub fn format_submission(text: &str, sender: &Sender, tag: &str) -> String {
    let mut formatted = format!("Sender chat id: {}\n\n{}\n{}{}", sender.id, text, tag, sender.id);
    if let Some(username) = &sender.username {
        formatted.push_str(&format!("\nusername: {username}"));
    }
    formatted
}

/// Split text into ordered chunks of at most `limit` characters
pub fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect();

    trace!(chars = chars.len(), chunks = chunks.len(), limit, "Split text into chunks");
    chunks
}

pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Length as Telegram counts it for caption limits, in UTF-16 code units
pub fn telegram_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Parse a chat id typed by staff
pub fn parse_chat_id(arg: &str) -> Option<i64> {
    arg.trim().parse::<i64>().ok()
}
