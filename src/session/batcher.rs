//! `OutgoingBatcher`: coalesces outgoing wire messages for one session
//! across a debounce window, pre-sorted high -> medium -> low (spec §4.8).
//!
//! This type owns no timer itself — it only tracks queued messages and
//! whether a debounce is already in flight. The per-session task (spec §5)
//! races the actual `tokio::time::sleep` in its `select!` loop and calls
//! [`OutgoingBatcher::take_batch`] when it fires or when a user-event frame
//! demands an immediate flush.

use std::collections::HashSet;

use strand_protocol::{Message, Priority};

use crate::session::backend::ConnectionId;

pub struct OutgoingBatcher {
    queue: Vec<(Priority, Message, HashSet<ConnectionId>)>,
    debounce_pending: bool,
}

impl Default for OutgoingBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OutgoingBatcher {
    pub fn new() -> Self {
        OutgoingBatcher {
            queue: Vec::new(),
            debounce_pending: false,
        }
    }

    /// `Queue(msg, priority, recipients)`. `recipients` is the set of
    /// watcher connection ids that should receive `msg` (spec §4.8 "pending
    /// queue of (message, watcher connection IDs)"); `flush` groups by this
    /// set so a connection that never watched the variable never sees it
    /// (spec §5). An `Update` for a variable already pending in this window
    /// merges into the existing entry (newest value wins, properties are
    /// merged, priority takes the more urgent of the two, recipients union)
    /// rather than appending a duplicate — otherwise three mutations of the
    /// same variable inside one debounce window would reach the wire as
    /// three messages instead of the one spec §4.8/§8 scenario 4 requires.
    pub fn queue(&mut self, priority: Priority, msg: Message, recipients: HashSet<ConnectionId>) {
        if let Message::Update(data) = &msg {
            let existing = self.queue.iter_mut().find_map(|(p, m, r)| match m {
                Message::Update(existing) if existing.var_id == data.var_id => {
                    Some((p, existing, r))
                }
                _ => None,
            });
            if let Some((existing_priority, existing_data, existing_recipients)) = existing {
                if data.value.is_some() {
                    existing_data.value = data.value.clone();
                }
                if let Some(new_props) = &data.properties {
                    existing_data
                        .properties
                        .get_or_insert_with(std::collections::BTreeMap::new)
                        .extend(new_props.clone());
                }
                *existing_priority = (*existing_priority).min(priority);
                existing_recipients.extend(recipients);
                return;
            }
        }
        self.queue.push((priority, msg, recipients));
    }

    /// `EnsureDebounceStarted()`. Returns `true` the first time it's called
    /// since the last flush, telling the caller it must now schedule the
    /// debounce timer; returns `false` on every subsequent call until the
    /// batch is taken, so the timer is armed exactly once per window.
    pub fn ensure_debounce_started(&mut self) -> bool {
        if self.debounce_pending {
            false
        } else {
            self.debounce_pending = true;
            true
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// `FlushNow()`: drains the queue sorted by priority (stable, so same-
    /// priority messages keep arrival order), pairing each message with its
    /// recipients, and resets the debounce flag. The caller groups these by
    /// connection so each one only ever receives what it watches.
    pub fn take_batch(&mut self) -> Vec<(Message, HashSet<ConnectionId>)> {
        self.queue.sort_by_key(|(p, _, _)| *p);
        self.debounce_pending = false;
        self.queue.drain(..).map(|(_, m, r)| (m, r)).collect()
    }

    /// `Clear()`: drops any queued messages without flushing them (used when
    /// a session is torn down mid-debounce).
    pub fn clear(&mut self) {
        self.queue.clear();
        self.debounce_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strand_protocol::{UpdateData, VarIdData};

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::for_test(id)
    }

    fn recipients(ids: &[u64]) -> HashSet<ConnectionId> {
        ids.iter().map(|id| conn(*id)).collect()
    }

    fn watch(id: i64) -> Message {
        Message::Watch(VarIdData { var_id: id })
    }

    fn update(id: i64, value: serde_json::Value) -> Message {
        Message::Update(UpdateData {
            var_id: id,
            value: Some(value),
            properties: None,
        })
    }

    #[test]
    fn repeated_updates_to_one_variable_coalesce_into_the_latest() {
        let mut batcher = OutgoingBatcher::new();
        batcher.queue(Priority::Medium, update(7, serde_json::json!("a")), recipients(&[1]));
        batcher.queue(Priority::Medium, update(7, serde_json::json!("b")), recipients(&[1]));
        batcher.queue(Priority::Medium, update(7, serde_json::json!("c")), recipients(&[1]));

        let batch = batcher.take_batch();
        assert_eq!(batch, vec![(update(7, serde_json::json!("c")), recipients(&[1]))]);
    }

    #[test]
    fn coalescing_a_message_queued_before_anyone_watched_unions_recipients() {
        // Mirrors session bootstrap: the root's viewdefs update is queued
        // with no watchers yet, then merges with the update produced once
        // the first connection sends `watch` (spec §8 scenario 1).
        let mut batcher = OutgoingBatcher::new();
        batcher.queue(Priority::High, update(1, serde_json::json!(null)), HashSet::new());
        batcher.queue(Priority::Medium, update(1, serde_json::json!("app")), recipients(&[1]));

        let batch = batcher.take_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].1, recipients(&[1]));
    }

    #[test]
    fn coalesced_update_keeps_the_more_urgent_priority_and_merges_properties() {
        let mut batcher = OutgoingBatcher::new();
        let mut first_props = BTreeMap::new();
        first_props.insert("type".to_string(), "Contact".to_string());
        batcher.queue(
            Priority::Low,
            Message::Update(UpdateData {
                var_id: 7,
                value: Some(serde_json::json!("a")),
                properties: Some(first_props),
            }),
            recipients(&[1]),
        );
        let mut second_props = BTreeMap::new();
        second_props.insert("error".to_string(), String::new());
        batcher.queue(
            Priority::High,
            Message::Update(UpdateData {
                var_id: 7,
                value: Some(serde_json::json!("b")),
                properties: Some(second_props),
            }),
            recipients(&[2]),
        );
        batcher.queue(Priority::Medium, watch(9), recipients(&[1]));

        let batch = batcher.take_batch();
        assert_eq!(batch.len(), 2);
        let (first_msg, first_recipients) = &batch[0];
        let Message::Update(merged) = first_msg else {
            panic!("expected the merged update to sort first as High priority");
        };
        assert_eq!(merged.value, Some(serde_json::json!("b")));
        let props = merged.properties.as_ref().unwrap();
        assert_eq!(props.get("type").map(String::as_str), Some("Contact"));
        assert_eq!(props.get("error").map(String::as_str), Some(""));
        assert_eq!(*first_recipients, recipients(&[1, 2]));
    }

    #[test]
    fn flush_sorts_high_before_medium_before_low() {
        let mut batcher = OutgoingBatcher::new();
        batcher.queue(Priority::Low, watch(3), recipients(&[1]));
        batcher.queue(Priority::High, watch(1), recipients(&[1]));
        batcher.queue(Priority::Medium, watch(2), recipients(&[1]));

        let batch = batcher.take_batch();
        let messages: Vec<Message> = batch.into_iter().map(|(m, _)| m).collect();
        assert_eq!(messages, vec![watch(1), watch(2), watch(3)]);
    }

    #[test]
    fn debounce_starts_once_until_taken() {
        let mut batcher = OutgoingBatcher::new();
        assert!(batcher.ensure_debounce_started());
        assert!(!batcher.ensure_debounce_started());
        batcher.queue(Priority::Medium, watch(1), recipients(&[1]));
        batcher.take_batch();
        assert!(batcher.ensure_debounce_started());
    }

    #[test]
    fn clear_drops_queue_and_resets_debounce() {
        let mut batcher = OutgoingBatcher::new();
        batcher.queue(Priority::High, watch(1), recipients(&[1]));
        batcher.ensure_debounce_started();
        batcher.clear();
        assert!(batcher.is_empty());
        assert!(batcher.ensure_debounce_started());
    }
}
