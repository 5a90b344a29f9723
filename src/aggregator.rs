//! # Media Group Aggregator Module
//!
//! Telegram delivers an album as separate messages sharing a media group id.
//! This module buffers those parts and posts them as one album once the
//! aggregation window has passed.
//!
//! # Lifecycle
//!
//! - The first part of an unknown group creates a pending entry and starts a
//!   one-shot timer
//! - Further parts are appended; the timer keeps its original deadline
//! - When the timer fires the entry is removed and flushed
//! - Parts arriving after the flush start a new group under the same key

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::messenger::MediaPart;
use crate::relay::SurveyRelay;
use crate::text_processing::{format_submission, strip_command};

/// Parts of one album waiting for their flush
#[derive(Debug)]
pub struct PendingMediaGroup {
    pub group_key: String,
    pub parts: Vec<MediaPart>,
    pub created_at: DateTime<Utc>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl PendingMediaGroup {
    fn new(group_key: String, generation: u64, first: MediaPart) -> Self {
        Self {
            group_key,
            parts: vec![first],
            created_at: Utc::now(),
            generation,
            timer: None,
        }
    }
}

struct AggregatorInner {
    pending: Mutex<HashMap<String, PendingMediaGroup>>,
    next_generation: AtomicU64,
    relay: Arc<SurveyRelay>,
    flush_delay: Duration,
    max_parts: usize,
}

/// Buffers media group parts and flushes each group once
#[derive(Clone)]
pub struct MediaGroupAggregator {
    inner: Arc<AggregatorInner>,
}

impl MediaGroupAggregator {
    pub fn new(relay: Arc<SurveyRelay>) -> Self {
        let delivery = &relay.config().delivery;
        let flush_delay = delivery.flush_delay;
        let max_parts = delivery.max_group_parts;

        Self {
            inner: Arc::new(AggregatorInner {
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                relay,
                flush_delay,
                max_parts,
            }),
        }
    }

    /// Buffer one part of the group identified by `group_key`
    pub async fn push(&self, group_key: &str, part: MediaPart) {
        let mut pending = self.inner.pending.lock().await;

        if let Some(group) = pending.get_mut(group_key) {
            group.parts.push(part);
            debug!(group_key, parts = group.parts.len(), "Appended part to pending media group");
            return;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut group = PendingMediaGroup::new(group_key.to_string(), generation, part);
        let inner = Arc::clone(&self.inner);
        let key = group_key.to_string();
        group.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.flush_delay).await;
            let group = inner.take(&key, Some(generation)).await;
            inner.flush(group).await;
        }));

        debug!(group_key, delay_secs = self.inner.flush_delay.as_secs(), "Started media group");
        pending.insert(group_key.to_string(), group);
    }

    /// Flush a group immediately instead of waiting for its timer
    pub async fn flush_now(&self, group_key: &str) {
        let group = self.inner.take(group_key, None).await;
        if let Some(timer) = group.as_ref().and_then(|g| g.timer.as_ref()) {
            timer.abort();
        }
        self.inner.flush(group).await;
    }

    /// Number of groups still waiting for their flush
    pub async fn pending_groups(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Drop every pending group and cancel its timer
    pub async fn shutdown(&self) {
        let mut pending = self.inner.pending.lock().await;
        for (group_key, group) in pending.drain() {
            if let Some(timer) = group.timer {
                timer.abort();
            }
            warn!(group_key = %group_key, parts = group.parts.len(), "Discarding pending media group on shutdown");
        }
    }
}

impl AggregatorInner {
    /// Remove a pending group, only if it is still the expected generation
    ///
    /// A timer that lost its group to `flush_now` must not take a newer
    /// group that reused the same key.
    async fn take(&self, group_key: &str, generation: Option<u64>) -> Option<PendingMediaGroup> {
        let mut pending = self.pending.lock().await;
        let stale = match (pending.get(group_key), generation) {
            (Some(group), Some(expected)) => group.generation != expected,
            (Some(_), None) => false,
            (None, _) => return None,
        };
        if stale {
            None
        } else {
            pending.remove(group_key)
        }
    }

    async fn flush(&self, group: Option<PendingMediaGroup>) {
        let Some(group) = group else {
            return;
        };
        let group_key = group.group_key.as_str();

        let Some(first) = group.parts.first() else {
            return;
        };
        let sender = first.sender();

        if group.parts.len() > self.max_parts {
            info!(
                user_id = sender.id,
                group_key,
                parts = group.parts.len(),
                "Rejecting media group with too many attachments"
            );
            let max = self.max_parts.to_string();
            let notice = self
                .relay
                .texts()
                .t_args("too-many-attachments", &[("max", &max)]);
            self.relay.notify(sender.id, &notice).await;
            return;
        }

        let caption = combined_caption(&group.parts, &self.relay.texts().t("survey-tag"));
        debug!(
            user_id = sender.id,
            group_key,
            age_ms = (Utc::now() - group.created_at).num_milliseconds(),
            "Flushing media group"
        );
        self.relay.deliver_group(&sender, &group.parts, &caption).await;
    }
}

/// Concatenate the formatted captions of every captioned part, in order
///
/// A group without any caption still gets the sender banner so reviewers
/// know who submitted it.
pub fn combined_caption(parts: &[MediaPart], tag: &str) -> String {
    let captions: Vec<String> = parts
        .iter()
        .filter_map(|part| {
            part.caption
                .as_deref()
                .filter(|caption| !caption.trim().is_empty())
                .map(|caption| format_submission(strip_command(caption, "survey"), &part.sender(), tag))
        })
        .collect();

    match (captions.is_empty(), parts.first()) {
        (true, Some(first)) => format_submission("", &first.sender(), tag),
        _ => captions.join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::MediaKind;

    fn part(caption: Option<&str>) -> MediaPart {
        MediaPart {
            media_kind: MediaKind::Photo,
            media_ref: "file".to_string(),
            caption: caption.map(str::to_string),
            sender_id: 9,
            sender_username: None,
        }
    }

    #[test]
    fn test_combined_caption_concatenates_in_order() {
        let caption = combined_caption(&[part(Some("first")), part(None), part(Some("second"))], "#t");
        let first = caption.find("first").unwrap();
        let second = caption.find("second").unwrap();
        assert!(first < second);
        assert_eq!(caption.matches("Sender chat id: 9").count(), 2);
    }

    #[test]
    fn test_combined_caption_without_captions_keeps_banner() {
        let caption = combined_caption(&[part(None), part(None)], "#t");
        assert_eq!(caption, "Sender chat id: 9\n\n\n#t9");
    }

    #[test]
    fn test_combined_caption_empty_group() {
        assert_eq!(combined_caption(&[], "#t"), "");
    }
}
