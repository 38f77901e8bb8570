use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::SpanCache;
use crate::classifier::ClassifiedNode;
use crate::text::Snapshot;

use super::{ScanOutcome, SensitiveScanner};

/// Why the host wants the classification refreshed
#[derive(Debug, Clone)]
pub enum Invalidation {
    /// The view was scrolled, resized or otherwise relaid out
    LayoutChanged { snapshot: Snapshot },
    TextEdited { snapshot: Snapshot },
    ClassificationChanged { snapshot: Snapshot },
}

impl Invalidation {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Invalidation::LayoutChanged { snapshot }
            | Invalidation::TextEdited { snapshot }
            | Invalidation::ClassificationChanged { snapshot } => snapshot,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Invalidation::LayoutChanged { .. } => "layout_changed",
            Invalidation::TextEdited { .. } => "text_edited",
            Invalidation::ClassificationChanged { .. } => "classification_changed",
        }
    }
}

/// Draws highlight regions for classified nodes
pub trait OverlayPainter: Send + Sync {
    /// Replace every previously drawn region with regions for `nodes`
    fn repaint(&self, nodes: &[ClassifiedNode], snapshot: &Snapshot);
}

/// Runs a full rescan for every invalidation and fans the result out to
/// the registered painters and the span cache
pub struct ScanCoordinator {
    scanner: SensitiveScanner,
    cache: Arc<SpanCache>,
    painters: Mutex<Vec<Arc<dyn OverlayPainter>>>,
}

impl ScanCoordinator {
    pub fn new(scanner: SensitiveScanner, cache: Arc<SpanCache>) -> Self {
        Self {
            scanner,
            cache,
            painters: Mutex::new(Vec::new()),
        }
    }

    pub fn scanner(&self) -> &SensitiveScanner {
        &self.scanner
    }

    pub fn cache(&self) -> &Arc<SpanCache> {
        &self.cache
    }

    pub fn add_painter(&self, painter: Arc<dyn OverlayPainter>) {
        self.painters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(painter);
    }

    /// Rescan, repaint, then publish to the cache
    pub fn invalidate(&self, invalidation: Invalidation) -> ScanOutcome {
        tracing::debug!(reason = invalidation.reason(), "rescanning");
        let snapshot = invalidation.snapshot();
        let outcome = self.scanner.scan(snapshot);

        let painters: Vec<Arc<dyn OverlayPainter>> = self
            .painters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for painter in painters {
            painter.repaint(&outcome.nodes, snapshot);
        }

        self.cache.replace(Arc::clone(&outcome.spans));
        outcome
    }
}
