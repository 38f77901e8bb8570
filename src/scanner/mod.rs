//! Scan orchestration
//!
//! A scan loads the project behind a snapshot, builds a fresh compiled
//! context, classifies the active document and bounds-checks the result
//! against the snapshot. Every failure along the way yields an empty scan;
//! nothing is reported to the host as an error.

mod coordinator;
mod tagger;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::SensitiveSpanSet;
use crate::classifier::{classify, ClassifiedNode};
use crate::config::MarkerConfig;
use crate::semantic::{CompiledContext, ReferenceResolver, ReferenceSpec};
use crate::text::{NormalizedSpans, Snapshot};
use crate::tree_sitter::CSharpParser;
use crate::workspace::{load_project_snapshot, DocumentProvider};

pub use coordinator::{Invalidation, OverlayPainter, ScanCoordinator};
pub use tagger::{SensitiveTagger, TagSpan, TagsChanged, TagsChangedListener};

/// A classified node that did not fit the snapshot it was reported for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedNode {
    pub offset: usize,
    pub length: usize,
    pub snapshot_len: usize,
}

/// Result of one complete scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    /// Classified nodes in classification order, duplicates included
    pub nodes: Vec<ClassifiedNode>,
    pub spans: Arc<SensitiveSpanSet>,
    pub skipped: Vec<SkippedNode>,
}

pub struct SensitiveScanner {
    provider: Arc<dyn DocumentProvider>,
    resolver: Arc<dyn ReferenceResolver>,
    references: Vec<ReferenceSpec>,
    marker: String,
    parse_timeout_micros: Option<u64>,
}

impl SensitiveScanner {
    pub fn new(
        provider: Arc<dyn DocumentProvider>,
        resolver: Arc<dyn ReferenceResolver>,
        config: &MarkerConfig,
    ) -> Self {
        Self {
            provider,
            resolver,
            references: ReferenceSpec::reference_set(config),
            marker: config.marker_capability.clone(),
            parse_timeout_micros: config.parse_timeout_micros,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn references(&self) -> &[ReferenceSpec] {
        &self.references
    }

    /// Scan the project owning `snapshot`
    pub fn scan(&self, snapshot: &Snapshot) -> ScanOutcome {
        let scan_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "sensitive_scan",
            %scan_id,
            buffer = %snapshot.buffer_id(),
            version = snapshot.version()
        );
        let _enter = span.enter();

        let mut nodes = Vec::new();
        let mut skipped = Vec::new();
        for node in self.classify_snapshot(snapshot) {
            if snapshot.text().get(node.span.start..node.span.end()).is_some() {
                nodes.push(node);
            } else {
                tracing::debug!(
                    offset = node.span.start,
                    length = node.span.length,
                    snapshot_len = snapshot.len(),
                    "skipping node outside snapshot"
                );
                skipped.push(SkippedNode {
                    offset: node.span.start,
                    length: node.span.length,
                    snapshot_len: snapshot.len(),
                });
            }
        }

        let spans = NormalizedSpans::new(nodes.iter().map(|node| node.span));
        let spans = Arc::new(SensitiveSpanSet::new(scan_id, snapshot, spans));

        tracing::debug!(
            nodes = nodes.len(),
            spans = spans.spans.len(),
            skipped = skipped.len(),
            "scan complete"
        );

        ScanOutcome {
            scan_id,
            nodes,
            spans,
            skipped,
        }
    }

    fn classify_snapshot(&self, snapshot: &Snapshot) -> Vec<ClassifiedNode> {
        let mut parser = match CSharpParser::new() {
            Ok(parser) => parser,
            Err(e) => {
                tracing::warn!(error = %e, "C# parser unavailable");
                return Vec::new();
            }
        };
        if let Some(micros) = self.parse_timeout_micros {
            parser = parser.with_timeout_micros(micros);
        }

        let Some(project) = load_project_snapshot(self.provider.as_ref(), &mut parser, snapshot)
        else {
            tracing::debug!("no project for snapshot");
            return Vec::new();
        };

        let context =
            match CompiledContext::build(&project, &self.references, self.resolver.as_ref()) {
                Ok(context) => context,
                Err(e) => {
                    tracing::warn!(project = %project.project(), error = %e, "failed to build compiled context");
                    return Vec::new();
                }
            };

        let model = context.active_model();
        classify(&model, model.root(), &self.marker)
    }
}
