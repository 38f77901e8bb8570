//! Text buffers and their snapshots

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::span::{SnapshotSpan, Span};

/// Identity of a text buffer, stable across its versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(Uuid);

impl BufferId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One replacement between two consecutive versions, in old-version offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub offset: usize,
    pub old_len: usize,
    pub new_len: usize,
}

impl TextChange {
    pub fn old_end(&self) -> usize {
        self.offset + self.old_len
    }
}

/// An edit request against the current snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub old_len: usize,
    pub text: String,
}

impl TextEdit {
    pub fn new(offset: usize, old_len: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            old_len,
            text: text.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::new(offset, 0, text)
    }

    pub fn delete(offset: usize, old_len: usize) -> Self {
        Self::new(offset, old_len, String::new())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {offset}..{end} is outside a buffer of length {len}")]
    OutOfBounds { offset: usize, end: usize, len: usize },

    #[error("edit boundary {0} is not on a char boundary")]
    NotCharBoundary(usize),

    #[error("edits overlap or are not in ascending order at offset {0}")]
    Unordered(usize),
}

/// A node in the forward-linked version chain of one buffer
struct VersionNode {
    number: u64,
    next: OnceLock<(Vec<TextChange>, Arc<VersionNode>)>,
}

impl VersionNode {
    fn root() -> Arc<Self> {
        Arc::new(Self {
            number: 0,
            next: OnceLock::new(),
        })
    }
}

/// Immutable view of a buffer at one version
#[derive(Clone)]
pub struct Snapshot {
    buffer: BufferId,
    text: Arc<str>,
    version: Arc<VersionNode>,
}

impl Snapshot {
    pub fn buffer_id(&self) -> BufferId {
        self.buffer
    }

    pub fn version(&self) -> u64 {
        self.version.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text, cheap to hand to parsers
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Span covering the whole snapshot
    pub fn full_span(&self) -> SnapshotSpan {
        SnapshotSpan::new(self.clone(), Span::new(0, self.len()))
    }

    /// Same buffer and same version
    pub fn same_version(&self, other: &Snapshot) -> bool {
        self.buffer == other.buffer && self.version() == other.version()
    }

    /// Visit the change batches leading from this version to `target`.
    ///
    /// Returns false when `target` belongs to another buffer, is older than
    /// this snapshot, or the chain does not reach it.
    pub(crate) fn walk_changes_to(
        &self,
        target: &Snapshot,
        mut visit: impl FnMut(&[TextChange]),
    ) -> bool {
        if self.buffer != target.buffer || target.version() < self.version() {
            return false;
        }

        let mut node = Arc::clone(&self.version);
        while node.number < target.version() {
            let Some((changes, next)) = node.next.get() else {
                return false;
            };
            visit(changes);
            let next = Arc::clone(next);
            node = next;
        }
        true
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("buffer", &self.buffer)
            .field("version", &self.version())
            .field("len", &self.len())
            .finish()
    }
}

/// Mutable text buffer owned by the host
///
/// Every edit publishes a new [`Snapshot`]; older snapshots stay valid and
/// can still translate their spans forward.
pub struct TextBuffer {
    id: BufferId,
    current: Mutex<Snapshot>,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let id = BufferId::new();
        let text: String = text.into();
        Self {
            id,
            current: Mutex::new(Snapshot {
                buffer: id,
                text: Arc::from(text),
                version: VersionNode::root(),
            }),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn current_snapshot(&self) -> Snapshot {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace `old_len` bytes at `offset` with `text`
    pub fn replace(&self, offset: usize, old_len: usize, text: &str) -> Result<Snapshot, EditError> {
        self.apply(&[TextEdit::new(offset, old_len, text)])
    }

    /// Apply a batch of non-overlapping edits, given in ascending order
    pub fn apply(&self, edits: &[TextEdit]) -> Result<Snapshot, EditError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let old = current.text();

        let mut last_end = 0;
        for edit in edits {
            let end = edit.offset + edit.old_len;
            if end > old.len() {
                return Err(EditError::OutOfBounds {
                    offset: edit.offset,
                    end,
                    len: old.len(),
                });
            }
            if edit.offset < last_end {
                return Err(EditError::Unordered(edit.offset));
            }
            for boundary in [edit.offset, end] {
                if !old.is_char_boundary(boundary) {
                    return Err(EditError::NotCharBoundary(boundary));
                }
            }
            last_end = end;
        }

        let mut text = String::with_capacity(old.len());
        let mut cursor = 0;
        let mut changes = Vec::with_capacity(edits.len());
        for edit in edits {
            text.push_str(&old[cursor..edit.offset]);
            text.push_str(&edit.text);
            cursor = edit.offset + edit.old_len;
            changes.push(TextChange {
                offset: edit.offset,
                old_len: edit.old_len,
                new_len: edit.text.len(),
            });
        }
        text.push_str(&old[cursor..]);

        let node = Arc::new(VersionNode {
            number: current.version() + 1,
            next: OnceLock::new(),
        });
        // Only the holder of the buffer lock links versions, so the cell is empty.
        let _ = current.version.next.set((changes, Arc::clone(&node)));

        let snapshot = Snapshot {
            buffer: self.id,
            text: Arc::from(text),
            version: node,
        };
        *current = snapshot.clone();

        tracing::trace!(buffer = %self.id, version = snapshot.version(), "published snapshot");
        Ok(snapshot)
    }
}
