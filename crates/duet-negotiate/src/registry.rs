use std::collections::BTreeSet;
use std::sync::Mutex;

use tracing::info;

/// Application-side bookkeeping of remote participants, keyed by stream id.
pub trait PeerRegistry: Send + Sync {
    fn add_peer(&self, stream_id: &str);
    fn remove_peer(&self, stream_id: &str);
}

/// Keeps the set of remote streams currently being received.
#[derive(Debug, Default)]
pub struct StreamRoster {
    streams: Mutex<BTreeSet<String>>,
}

impl StreamRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.lock().contains(stream_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PeerRegistry for StreamRoster {
    fn add_peer(&self, stream_id: &str) {
        // Audio and video of one stream both report a track.
        if self.lock().insert(stream_id.to_string()) {
            info!(stream_id, "remote peer stream added");
        }
    }

    fn remove_peer(&self, stream_id: &str) {
        if self.lock().remove(stream_id) {
            info!(stream_id, "remote peer stream removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_add_is_idempotent() {
        let roster = StreamRoster::new();
        roster.add_peer("stream-a");
        roster.add_peer("stream-a");
        roster.add_peer("stream-b");
        assert_eq!(roster.streams(), vec!["stream-a", "stream-b"]);
    }

    #[test]
    fn test_roster_remove() {
        let roster = StreamRoster::new();
        roster.add_peer("stream-a");
        roster.remove_peer("stream-a");
        roster.remove_peer("never-added");
        assert!(roster.is_empty());
        assert!(!roster.contains("stream-a"));
    }
}
