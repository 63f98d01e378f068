//! Index from a command message to the bot's reply.
//!
//! When a user edits a command shortly after sending it, the chat layer
//! looks the command message up here and edits the bot's reply in place
//! instead of sending a new one.

use super::{BoundedCache, CacheConfig};

/// Recent command responses, keyed by the inbound command message id.
///
/// `H` is whatever handle the chat layer needs to edit a sent message.
#[derive(Clone, Debug)]
pub struct ResponseEditCache<H>
where
    H: Clone + Send + Sync + 'static,
{
    cache: BoundedCache<u64, H>,
}

impl<H> Default for ResponseEditCache<H>
where
    H: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::response_edits())
    }
}

impl<H> ResponseEditCache<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: BoundedCache::new("response_edits", config),
        }
    }

    /// Remember the reply sent for a command. Call only after the send succeeded.
    pub fn record(&self, command_message_id: u64, response: H) {
        self.cache.put(command_message_id, response);
    }

    /// Look up the reply for a command message, if it is still tracked.
    pub fn lookup(&self, command_message_id: u64) -> Option<H> {
        self.cache.get(&command_message_id)
    }

    /// Handle an edit event for `command_message_id`.
    ///
    /// Runs `edit` with the tracked reply and returns `true`. Untracked or
    /// expired ids are silently ignored and return `false`.
    pub fn on_edit<F>(&self, command_message_id: u64, edit: F) -> bool
    where
        F: FnOnce(H),
    {
        match self.lookup(command_message_id) {
            Some(response) => {
                edit(response);
                true
            }
            None => false,
        }
    }

    /// Stop tracking a command, e.g. after its reply was deleted.
    pub fn forget(&self, command_message_id: u64) {
        self.cache.invalidate(&command_message_id);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct SentMessage {
        channel_id: u64,
        message_id: u64,
    }

    #[test]
    fn test_record_then_lookup() {
        let edits = ResponseEditCache::default();
        let reply = SentMessage { channel_id: 1, message_id: 500 };
        edits.record(42, reply.clone());

        assert_eq!(edits.lookup(42), Some(reply));
        assert_eq!(edits.lookup(99), None);
    }

    #[test]
    fn test_on_edit_miss_is_silent() {
        let edits: ResponseEditCache<SentMessage> = ResponseEditCache::default();
        let mut called = false;

        assert!(!edits.on_edit(99, |_| called = true));
        assert!(!called);
    }

    #[test]
    fn test_on_edit_hit_passes_reply() {
        let edits = ResponseEditCache::default();
        edits.record(42, SentMessage { channel_id: 1, message_id: 500 });

        let mut edited = None;
        assert!(edits.on_edit(42, |reply| edited = Some(reply.message_id)));
        assert_eq!(edited, Some(500));
    }

    #[test]
    fn test_only_recent_commands_are_tracked() {
        let edits = ResponseEditCache::default();
        for id in 1..=6 {
            edits.record(id, SentMessage { channel_id: 1, message_id: id + 100 });
        }

        assert_eq!(edits.len(), 5);
        assert_eq!(edits.lookup(1), None);
        assert!(edits.lookup(6).is_some());
    }

    #[test]
    fn test_forget() {
        let edits = ResponseEditCache::default();
        edits.record(42, SentMessage { channel_id: 1, message_id: 500 });
        edits.forget(42);

        assert!(edits.is_empty());
    }
}
