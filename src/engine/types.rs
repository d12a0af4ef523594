//! Pager configuration types
//!
//! A pager splits into three parts: immutable configuration shared by every
//! sibling produced through fluent configuration, per-instance options, and
//! per-instance consumption state (which lives in `mod.rs`).

use crate::cipher::KeyCache;
use crate::schema::KeySchema;
use crate::types::{Item, Operation, PageSource, QueryDescriptor, SegmentId};
use std::fmt;
use std::sync::Arc;

/// Client-side item predicate.
///
/// Runs after the store's own filter expression; items it rejects are
/// dropped silently and never count toward the pager's limit.
pub type FilterPredicate = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// Immutable configuration shared across configured siblings of one pager
pub(crate) struct PagerShared {
    /// The store handle
    pub store: Arc<dyn PageSource>,
    /// Memoized sub-key derivation
    pub keys: Arc<KeyCache>,
    /// The query/scan being paged
    pub descriptor: QueryDescriptor,
    /// Query or scan
    pub operation: Operation,
    /// Base table key attributes
    pub base_schema: KeySchema,
    /// Index key attributes, when the descriptor targets a secondary index
    pub index_schema: Option<KeySchema>,
    /// Segment coordinates, for engines owned by a parallel scanner
    pub segment: Option<SegmentId>,
}

impl fmt::Debug for PagerShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerShared")
            .field("descriptor", &self.descriptor)
            .field("operation", &self.operation)
            .field("base_schema", &self.base_schema)
            .field("index_schema", &self.index_schema)
            .field("segment", &self.segment)
            .finish_non_exhaustive()
    }
}

/// Per-instance options, applied copy-on-configure
#[derive(Clone, Default)]
pub(crate) struct PagerOptions {
    /// Maximum number of qualifying items to yield
    pub limit: Option<u64>,
    /// Opaque resumption token, decoded on first pull
    pub from: Option<String>,
    /// Client-side predicate
    pub filter: Option<FilterPredicate>,
    /// Associated data bound into every token this pager reads or writes
    pub context: Vec<u8>,
}

impl fmt::Debug for PagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerOptions")
            .field("limit", &self.limit)
            .field("from", &self.from.as_deref().map(|_| "<token>"))
            .field("filter", &self.filter.as_ref().map(|_| "<predicate>"))
            .field("context_len", &self.context.len())
            .finish()
    }
}
