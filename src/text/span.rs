//! Spans, edit tracking and normalized span collections

use serde::{Deserialize, Serialize};

use super::buffer::{Snapshot, TextChange};

/// Half-open byte range `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub length: usize,
}

impl Span {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self {
            start,
            length: end.saturating_sub(start),
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Non-empty intersection with `other`
    pub fn overlap(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        (start < end).then(|| Span::from_bounds(start, end))
    }

    /// Track this span through one batch of changes
    pub fn track(self, changes: &[TextChange], mode: SpanTrackingMode) -> Span {
        let (start_mode, end_mode) = mode.point_modes();
        // Changes are ascending in old offsets; applying them back to front
        // keeps every earlier offset valid.
        let mut start = self.start;
        let mut end = self.end();
        for change in changes.iter().rev() {
            start = track_point(start, change, start_mode);
            end = track_point(end, change, end_mode);
        }
        Span::from_bounds(start, end.max(start))
    }

    /// Translate a span computed against `from` onto the later snapshot `to`.
    ///
    /// Returns `None` when `to` belongs to another buffer or precedes `from`.
    pub fn translate(self, from: &Snapshot, to: &Snapshot, mode: SpanTrackingMode) -> Option<Span> {
        let mut span = self;
        from.walk_changes_to(to, |changes| span = span.track(changes, mode))
            .then_some(span)
    }
}

/// Which side of an edit a point sticks to when text is inserted at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointTrackingMode {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanTrackingMode {
    /// Insertions at either edge stay outside the span
    EdgeExclusive,
    /// Insertions at either edge grow the span
    EdgeInclusive,
}

impl SpanTrackingMode {
    fn point_modes(self) -> (PointTrackingMode, PointTrackingMode) {
        match self {
            SpanTrackingMode::EdgeExclusive => {
                (PointTrackingMode::Positive, PointTrackingMode::Negative)
            }
            SpanTrackingMode::EdgeInclusive => {
                (PointTrackingMode::Negative, PointTrackingMode::Positive)
            }
        }
    }
}

fn track_point(point: usize, change: &TextChange, mode: PointTrackingMode) -> usize {
    let after_change =
        point > change.old_end() || (point == change.old_end() && change.old_len > 0);

    if point < change.offset {
        point
    } else if after_change {
        point - change.old_len + change.new_len
    } else {
        match mode {
            PointTrackingMode::Positive => change.offset + change.new_len,
            PointTrackingMode::Negative => change.offset,
        }
    }
}

/// A span bound to the snapshot it is valid for
#[derive(Debug, Clone)]
pub struct SnapshotSpan {
    pub snapshot: Snapshot,
    pub span: Span,
}

impl SnapshotSpan {
    pub fn new(snapshot: Snapshot, span: Span) -> Self {
        Self { snapshot, span }
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end()
    }

    pub fn len(&self) -> usize {
        self.span.length
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Covered text, or `None` if the span does not fit the snapshot
    pub fn text(&self) -> Option<&str> {
        self.snapshot.text().get(self.span.start..self.span.end())
    }

    pub fn translate_to(&self, target: &Snapshot, mode: SpanTrackingMode) -> Option<SnapshotSpan> {
        self.span
            .translate(&self.snapshot, target, mode)
            .map(|span| SnapshotSpan::new(target.clone(), span))
    }
}

/// Sorted spans with overlapping and abutting neighbours merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSpans(Vec<Span>);

impl NormalizedSpans {
    pub fn new(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut spans: Vec<Span> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        spans.sort_unstable();

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.start <= last.end() => {
                    let end = last.end().max(span.end());
                    *last = Span::from_bounds(last.start, end);
                }
                _ => merged.push(span),
            }
        }
        Self(merged)
    }

    /// Non-empty intersections between the two collections
    pub fn overlap(left: &NormalizedSpans, right: &NormalizedSpans) -> NormalizedSpans {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < left.0.len() && j < right.0.len() {
            let (a, b) = (left.0[i], right.0[j]);
            if let Some(overlap) = a.overlap(&b) {
                out.push(overlap);
            }
            if a.end() <= b.end() {
                i += 1;
            } else {
                j += 1;
            }
        }
        NormalizedSpans(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Span] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Span> for NormalizedSpans {
    fn from_iter<T: IntoIterator<Item = Span>>(iter: T) -> Self {
        Self::new(iter)
    }
}
