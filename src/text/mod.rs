//! Versioned text model
//!
//! Buffers publish immutable snapshots. Every snapshot links forward to the
//! next version together with the edits that produced it, so a span computed
//! against one version can be tracked onto any later version of the same
//! buffer without re-scanning.

mod buffer;
mod span;

pub use buffer::{BufferId, EditError, Snapshot, TextBuffer, TextChange, TextEdit};
pub use span::{NormalizedSpans, PointTrackingMode, SnapshotSpan, Span, SpanTrackingMode};
