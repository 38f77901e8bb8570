//! Tag provider backed by the span cache

use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::cache::{SpanCache, SubscriptionId};
use crate::text::{NormalizedSpans, SnapshotSpan, TextBuffer};

/// A sensitive region intersecting a query span
#[derive(Debug, Clone)]
pub struct TagSpan {
    pub span: SnapshotSpan,
    /// Scan that produced the region
    pub scan_id: Uuid,
}

/// Tags may have changed anywhere inside `span`
#[derive(Debug, Clone)]
pub struct TagsChanged {
    pub span: SnapshotSpan,
}

pub trait TagsChangedListener: Send + Sync {
    fn tags_changed(&self, event: &TagsChanged);
}

type ListenerList = Arc<Mutex<Vec<Arc<dyn TagsChangedListener>>>>;

/// Serves cached sensitive spans for one buffer
///
/// Every cache refresh for the buffer raises a [`TagsChanged`] covering the
/// buffer's entire current snapshot.
pub struct SensitiveTagger {
    buffer: Arc<TextBuffer>,
    cache: Arc<SpanCache>,
    listeners: ListenerList,
    subscription: SubscriptionId,
}

impl SensitiveTagger {
    pub fn new(buffer: Arc<TextBuffer>, cache: Arc<SpanCache>) -> Self {
        let listeners: ListenerList = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let buffer = Arc::clone(&buffer);
            let listeners = Arc::clone(&listeners);
            cache.subscribe(move |set| {
                if set.buffer != buffer.id() {
                    return;
                }
                let event = TagsChanged {
                    span: buffer.current_snapshot().full_span(),
                };
                let targets: Vec<Arc<dyn TagsChangedListener>> = listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for listener in targets {
                    listener.tags_changed(&event);
                }
            })
        };

        Self {
            buffer,
            cache,
            listeners,
            subscription,
        }
    }

    pub fn buffer(&self) -> &Arc<TextBuffer> {
        &self.buffer
    }

    pub fn add_listener(&self, listener: Arc<dyn TagsChangedListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Cached sensitive regions overlapping `spans`, on the snapshot of the
    /// first query span. Query spans from other snapshots are ignored.
    pub fn tags(&self, spans: &[SnapshotSpan]) -> Vec<TagSpan> {
        let Some(first) = spans.first() else {
            return Vec::new();
        };
        let snapshot = &first.snapshot;
        if snapshot.buffer_id() != self.buffer.id() {
            return Vec::new();
        }
        // One read of the cache, so spans and scan id come from the same set
        let Some(set) = self.cache.current().filter(|set| set.buffer == snapshot.buffer_id()) else {
            return Vec::new();
        };

        let query: NormalizedSpans = spans
            .iter()
            .filter(|s| s.snapshot.same_version(snapshot))
            .map(|s| s.span)
            .collect();
        let cached = set.spans_for(snapshot);

        NormalizedSpans::overlap(&query, &cached)
            .iter()
            .map(|span| TagSpan {
                span: SnapshotSpan::new(snapshot.clone(), *span),
                scan_id: set.scan_id,
            })
            .collect()
    }
}

impl Drop for SensitiveTagger {
    fn drop(&mut self) {
        self.cache.unsubscribe(self.subscription);
    }
}
