//! Cache of the last completed scan
//!
//! Holds one immutable span set behind a mutex. A finished scan swaps in its
//! set whole, so readers see either the previous scan or the new one and
//! never a mix. Reads against a newer snapshot translate the stored spans
//! forward with edge-exclusive tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::text::{BufferId, NormalizedSpans, Snapshot, Span, SpanTrackingMode};

/// Normalized spans of one complete scan, valid for the snapshot it ran on
#[derive(Debug, Clone, Serialize)]
pub struct SensitiveSpanSet {
    pub scan_id: Uuid,
    pub buffer: BufferId,
    pub version: u64,
    pub spans: NormalizedSpans,
    pub completed_at: DateTime<Utc>,
    #[serde(skip)]
    snapshot: Snapshot,
}

impl SensitiveSpanSet {
    pub fn new(scan_id: Uuid, snapshot: &Snapshot, spans: NormalizedSpans) -> Self {
        Self {
            scan_id,
            buffer: snapshot.buffer_id(),
            version: snapshot.version(),
            spans,
            completed_at: Utc::now(),
            snapshot: snapshot.clone(),
        }
    }

    /// A set with no spans, for scans that found nothing or failed open
    pub fn empty(scan_id: Uuid, snapshot: &Snapshot) -> Self {
        Self::new(scan_id, snapshot, NormalizedSpans::default())
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The spans as seen from `target`.
    ///
    /// Returns nothing when `target` is another buffer or an older version;
    /// a fresh scan for that snapshot is expected to follow.
    pub fn spans_for(&self, target: &Snapshot) -> NormalizedSpans {
        if self.snapshot.same_version(target) {
            return self.spans.clone();
        }

        let mut spans: Vec<Span> = self.spans.iter().copied().collect();
        let reachable = self.snapshot.walk_changes_to(target, |changes| {
            for span in spans.iter_mut() {
                *span = span.track(changes, SpanTrackingMode::EdgeExclusive);
            }
        });
        if !reachable {
            tracing::debug!(
                scan_id = %self.scan_id,
                stored_version = self.version,
                requested_version = target.version(),
                "cannot translate spans to requested snapshot"
            );
            return NormalizedSpans::default();
        }

        NormalizedSpans::new(spans)
    }
}

/// Callback invoked with every newly stored set
pub type CacheListener = Arc<dyn Fn(&Arc<SensitiveSpanSet>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct SpanCache {
    current: Mutex<Option<Arc<SensitiveSpanSet>>>,
    listeners: Mutex<Vec<(SubscriptionId, CacheListener)>>,
    next_subscription: AtomicU64,
}

impl SpanCache {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Store `set`, then notify listeners outside the lock
    pub fn replace(&self, set: Arc<SensitiveSpanSet>) {
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            *current = Some(Arc::clone(&set));
        }
        tracing::debug!(
            scan_id = %set.scan_id,
            version = set.version,
            spans = set.spans.len(),
            completed_at = %set.completed_at,
            "span cache replaced"
        );

        let listeners: Vec<CacheListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&set);
        }
    }

    /// The stored set, if any scan has completed
    pub fn current(&self) -> Option<Arc<SensitiveSpanSet>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cached spans translated onto `snapshot`
    pub fn spans_for(&self, snapshot: &Snapshot) -> NormalizedSpans {
        let Some(set) = self.current() else {
            return NormalizedSpans::default();
        };
        if set.buffer != snapshot.buffer_id() {
            tracing::debug!(
                cached = %set.buffer,
                requested = %snapshot.buffer_id(),
                "span cache holds another buffer"
            );
            return NormalizedSpans::default();
        }
        set.spans_for(snapshot)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Arc<SensitiveSpanSet>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SpanCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextBuffer;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn set_for(snapshot: &Snapshot, spans: &[Span]) -> Arc<SensitiveSpanSet> {
        Arc::new(SensitiveSpanSet::new(
            Uuid::new_v4(),
            snapshot,
            NormalizedSpans::new(spans.iter().copied()),
        ))
    }

    #[test]
    fn test_empty_cache_returns_nothing() {
        let cache = SpanCache::new();
        let buffer = TextBuffer::new("class A { }");
        assert!(cache.current().is_none());
        assert!(cache.spans_for(&buffer.current_snapshot()).is_empty());
    }

    #[test]
    fn test_same_version_returns_stored_spans() {
        let cache = SpanCache::new();
        let buffer = TextBuffer::new("var secret = vault.Key;");
        let snapshot = buffer.current_snapshot();
        cache.replace(set_for(&snapshot, &[Span::new(13, 9), Span::new(4, 6)]));

        assert_eq!(
            cache.spans_for(&snapshot).as_slice(),
            &[Span::new(4, 6), Span::new(13, 9)]
        );
    }

    #[test]
    fn test_translates_to_newer_version() {
        let cache = SpanCache::new();
        let buffer = TextBuffer::new("var secret = vault.Key;");
        let scanned = buffer.current_snapshot();
        cache.replace(set_for(&scanned, &[Span::new(4, 6), Span::new(13, 9)]));

        // Insertion strictly after the first span, at the start of the second
        let edited = buffer.replace(13, 0, "(object)").unwrap();
        assert_eq!(
            cache.spans_for(&edited).as_slice(),
            &[Span::new(4, 6), Span::new(21, 9)]
        );
    }

    #[test]
    fn test_older_version_yields_nothing() {
        let cache = SpanCache::new();
        let buffer = TextBuffer::new("var secret = vault.Key;");
        let old = buffer.current_snapshot();
        let new = buffer.replace(0, 0, "  ").unwrap();
        cache.replace(set_for(&new, &[Span::new(6, 6)]));

        assert!(cache.spans_for(&old).is_empty());
    }

    #[test]
    fn test_other_buffer_yields_nothing() {
        let cache = SpanCache::new();
        let first = TextBuffer::new("var secret = 1;");
        let second = TextBuffer::new("var secret = 1;");
        cache.replace(set_for(&first.current_snapshot(), &[Span::new(4, 6)]));

        assert!(cache.spans_for(&second.current_snapshot()).is_empty());
    }

    #[test]
    fn test_span_deleted_by_edit_is_dropped() {
        let cache = SpanCache::new();
        let buffer = TextBuffer::new("var secret = 1;");
        let scanned = buffer.current_snapshot();
        cache.replace(set_for(&scanned, &[Span::new(4, 6)]));

        let edited = buffer.replace(3, 8, " ").unwrap();
        assert!(cache.spans_for(&edited).is_empty());
    }

    #[test]
    fn test_listeners_notified_and_unsubscribed() {
        let cache = SpanCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = cache.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let buffer = TextBuffer::new("class A { }");
        cache.replace(set_for(&buffer.current_snapshot(), &[]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.unsubscribe(id));
        assert!(!cache.unsubscribe(id));
        cache.replace(set_for(&buffer.current_snapshot(), &[]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_read_cache() {
        let cache = Arc::new(SpanCache::new());
        let seen = Arc::new(Mutex::new(None));
        let (reader, sink) = (Arc::clone(&cache), Arc::clone(&seen));
        cache.subscribe(move |set| {
            let current = reader.current().map(|c| c.scan_id);
            *sink.lock().unwrap() = Some((set.scan_id, current));
        });

        let buffer = TextBuffer::new("class A { }");
        let set = set_for(&buffer.current_snapshot(), &[Span::new(0, 5)]);
        let scan_id = set.scan_id;
        cache.replace(set);

        assert_eq!(*seen.lock().unwrap(), Some((scan_id, Some(scan_id))));
    }

    #[test]
    fn test_concurrent_replace_never_mixes_sets() {
        let cache = Arc::new(SpanCache::new());
        let buffer = Arc::new(TextBuffer::new("x".repeat(4096)));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let (cache, buffer) = (Arc::clone(&cache), Arc::clone(&buffer));
                thread::spawn(move || {
                    for round in 0..50 {
                        // Every span of one set shares the same length
                        let len = 1 + (w * 50 + round) % 7;
                        let spans: Vec<Span> = (0..8).map(|i| Span::new(i * 100, len)).collect();
                        cache.replace(set_for(&buffer.current_snapshot(), &spans));
                    }
                })
            })
            .collect();

        let reader = {
            let (cache, buffer) = (Arc::clone(&cache), Arc::clone(&buffer));
            thread::spawn(move || {
                for _ in 0..500 {
                    let spans = cache.spans_for(&buffer.current_snapshot());
                    let first = spans.iter().next().copied();
                    if let Some(first) = first {
                        assert_eq!(spans.len(), 8);
                        assert!(spans.iter().all(|s| s.length == first.length));
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(cache.current().unwrap().spans.len(), 8);
    }

    #[test]
    fn test_serializes_without_snapshot() {
        let buffer = TextBuffer::new("class A { }");
        let set = SensitiveSpanSet::new(
            Uuid::nil(),
            &buffer.current_snapshot(),
            NormalizedSpans::new([Span::new(6, 1)]),
        );
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["version"], 0);
        assert_eq!(json["spans"][0]["start"], 6);
        assert!(json.get("snapshot").is_none());
    }
}
