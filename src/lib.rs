//! Marks C# expressions whose static type implements a marker capability.
//!
//! The pipeline for one trigger:
//!
//! 1. [`workspace`] resolves the project behind a [`text::Snapshot`] and
//!    parses every document with [`tree_sitter`].
//! 2. [`semantic`] builds a throwaway compiled context: a type graph over
//!    the project declarations plus the base-library references.
//! 3. [`classifier`] flags member accesses and identifiers whose type
//!    transitively implements the marker interface.
//! 4. [`scanner`] bounds-checks the result, hands the raw nodes to overlay
//!    painters and swaps the spans into the [`cache`], from which taggers
//!    serve translated spans for later snapshots.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod scanner;
pub mod semantic;
pub mod text;
pub mod tree_sitter;
pub mod workspace;

pub use cache::{SensitiveSpanSet, SpanCache, SubscriptionId};
pub use classifier::{ClassifiedNode, NodeKind, Resolution};
pub use config::{load_config, save_config, MarkerConfig, DEFAULT_MARKER_CAPABILITY};
pub use scanner::{
    Invalidation, OverlayPainter, ScanCoordinator, ScanOutcome, SensitiveScanner,
    SensitiveTagger, SkippedNode, TagSpan, TagsChanged, TagsChangedListener,
};
pub use text::{Snapshot, SnapshotSpan, Span, TextBuffer};
