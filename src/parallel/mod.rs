//! Parallel scan coordinator
//!
//! Fans one scan out over N independent segments, each driven by its own
//! pagination engine, and merges their output as pages arrive. Items
//! interleave in request-completion order, not segment order: whichever
//! segment's fetch resolves first has an item popped first, so output
//! ordering across segments is non-deterministic by design.
//!
//! One composite token encodes all N segment positions as repeated
//! `be32 length ‖ flattened key` frames; a zero length marks a segment with
//! no saved position.

use crate::cipher::{self, KeyCache};
use crate::codec;
use crate::engine::{Pager, PagerOptions, PagerShared, Step};
use crate::error::{Error, Result};
use crate::schema::KeySchema;
use crate::types::{Item, Key, Operation, PageResponse, PageSource, QueryDescriptor, SegmentId};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type PendingFetch = BoxFuture<'static, (usize, Result<PageResponse>)>;

/// Coordinated multi-segment scan behind one iterator and one composite
/// continuation token.
///
/// Created by [`Paginator::parallel_scan`](crate::Paginator::parallel_scan).
/// Configuration methods return a new scanner with fresh consumption state.
pub struct ParallelScanner {
    store: Arc<dyn PageSource>,
    keys: Arc<KeyCache>,
    schema: KeySchema,
    descriptor: QueryDescriptor,
    total: u32,
    options: PagerOptions,
    /// Segment engines, empty until the first pull
    engines: Vec<Pager>,
    /// Indices of segments that are not yet finished
    active: BTreeSet<usize>,
    /// Segments with a fetch currently outstanding
    armed: Vec<bool>,
    /// Outstanding fetches, raced first-completed-wins
    pending: FuturesUnordered<PendingFetch>,
}

impl fmt::Debug for ParallelScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelScanner")
            .field("descriptor", &self.descriptor)
            .field("total", &self.total)
            .field("active", &self.active)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl ParallelScanner {
    pub(crate) fn new(
        store: Arc<dyn PageSource>,
        keys: Arc<KeyCache>,
        schema: KeySchema,
        descriptor: QueryDescriptor,
        total: u32,
    ) -> Result<Self> {
        if total == 0 {
            return Err(Error::state("a parallel scan needs at least one segment"));
        }
        if descriptor.index_name.is_some() {
            return Err(Error::state(
                "parallel scans run against the base table, not an index",
            ));
        }
        Ok(Self {
            store,
            keys,
            schema,
            descriptor,
            total,
            options: PagerOptions::default(),
            engines: Vec::new(),
            active: BTreeSet::new(),
            armed: Vec::new(),
            pending: FuturesUnordered::new(),
        })
    }

    // ============================================================================
    // Fluent configuration (copy-on-configure)
    // ============================================================================

    /// A sibling scanner yielding at most `limit` qualifying items overall
    #[must_use]
    pub fn limit(&self, limit: u64) -> Self {
        self.configured(PagerOptions {
            limit: Some(limit),
            ..self.options.clone()
        })
    }

    /// A sibling scanner resuming from a composite continuation token
    #[must_use]
    pub fn start_from(&self, token: impl Into<String>) -> Self {
        self.configured(PagerOptions {
            from: Some(token.into()),
            ..self.options.clone()
        })
    }

    /// A sibling scanner applying a client-side predicate in every segment
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.configured(PagerOptions {
            filter: Some(Arc::new(predicate)),
            ..self.options.clone()
        })
    }

    /// A sibling scanner binding tokens to the given associated data
    #[must_use]
    pub fn context(&self, aad: impl AsRef<[u8]>) -> Self {
        self.configured(PagerOptions {
            context: aad.as_ref().to_vec(),
            ..self.options.clone()
        })
    }

    fn configured(&self, options: PagerOptions) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            schema: self.schema.clone(),
            descriptor: self.descriptor.clone(),
            total: self.total,
            options,
            engines: Vec::new(),
            active: BTreeSet::new(),
            armed: Vec::new(),
            pending: FuturesUnordered::new(),
        }
    }

    // ============================================================================
    // Iteration
    // ============================================================================

    /// Pull the next item from whichever segment produces one first.
    ///
    /// A page-fetch failure in any segment aborts the pull; no segment state
    /// advanced for the failed fetch, so retrying is safe.
    pub async fn next_item(&mut self) -> Result<Option<Item>> {
        self.prepare().await?;

        if let Some(limit) = self.options.limit {
            if self.count() >= limit {
                return Ok(None);
            }
        }

        loop {
            for index in self.active.clone() {
                match self.engines[index].drain_step()? {
                    Step::Item(item) => return Ok(Some(item)),
                    Step::Finished => {
                        debug!(segment = index, "segment exhausted");
                        self.active.remove(&index);
                    }
                    Step::Fetch => {
                        if !self.armed[index] {
                            self.arm(index);
                        }
                    }
                }
            }

            // Race: first completed fetch wins. Every still-active segment
            // has exactly one fetch in the set by this point.
            let Some((index, result)) = self.pending.next().await else {
                return Ok(None);
            };
            self.armed[index] = false;
            self.engines[index].absorb_page(result?);
        }
    }

    /// Lookahead is not supported: "the next item" is ambiguous while
    /// segments race, so this always fails.
    pub fn peek(&self) -> Result<Option<Item>> {
        Err(Error::state(
            "peek is not supported for parallel scans: the next item is ambiguous across racing segments",
        ))
    }

    /// Drain every remaining item into a vector.
    ///
    /// Without a limit this buffers the table's entire remaining contents.
    pub async fn all(&mut self) -> Result<Vec<Item>> {
        if self.options.limit.is_none() {
            warn!(
                table = %self.descriptor.table,
                "draining a parallel scan with no limit buffers the entire table"
            );
        }
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt this scanner into a `futures` stream.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Item>> {
        futures::stream::unfold((self, false), |(mut scanner, failed)| async move {
            if failed {
                return None;
            }
            match scanner.next_item().await {
                Ok(Some(item)) => Some((Ok(item), (scanner, false))),
                Ok(None) => None,
                Err(err) => Some((Err(err), (scanner, true))),
            }
        })
    }

    // ============================================================================
    // Read accessors
    // ============================================================================

    /// Seal every segment's resumption pointer into one composite token.
    ///
    /// `Ok(None)` before the first pull has constructed the segments.
    pub fn next_token(&self) -> Result<Option<String>> {
        if self.engines.is_empty() {
            return Ok(None);
        }
        let keys = self
            .keys
            .resolved()
            .ok_or_else(|| Error::state("next_token read before any page was fetched"))?;

        let mut plaintext = Vec::new();
        for engine in &self.engines {
            match engine.pointer() {
                Some(key) => {
                    let bytes = codec::flatten(key)?;
                    plaintext.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                    plaintext.extend_from_slice(&bytes);
                }
                None => plaintext.extend_from_slice(&0u32.to_be_bytes()),
            }
        }
        Ok(Some(cipher::seal(&plaintext, keys, &self.options.context)))
    }

    /// True once every segment is finished
    pub fn finished(&self) -> bool {
        !self.engines.is_empty() && self.engines.iter().all(Pager::finished)
    }

    /// Qualifying items yielded across all segments
    pub fn count(&self) -> u64 {
        self.engines.iter().map(Pager::count).sum()
    }

    /// Page requests completed across all segments
    pub fn request_count(&self) -> u64 {
        self.engines.iter().map(Pager::request_count).sum()
    }

    /// Items the store examined across all segments
    pub fn scanned_count(&self) -> u64 {
        self.engines.iter().map(Pager::scanned_count).sum()
    }

    /// Capacity units consumed across all segments
    pub fn consumed_capacity(&self) -> f64 {
        self.engines.iter().map(Pager::consumed_capacity).sum()
    }

    // ============================================================================
    // Internals
    // ============================================================================

    /// Resolve sub-keys, decode the composite token, construct the segment
    /// engines. Runs once.
    async fn prepare(&mut self) -> Result<()> {
        if !self.engines.is_empty() {
            return Ok(());
        }

        let keys = self.keys.sub_keys().await?;
        let starts = match &self.options.from {
            Some(token) => {
                let plaintext = cipher::open(token, keys, &self.options.context)?;
                decode_composite(&plaintext, self.total)?
            }
            None => vec![None; self.total as usize],
        };

        for (index, start_key) in starts.into_iter().enumerate() {
            let mut descriptor = self.descriptor.clone();
            descriptor.start_key = start_key;
            let shared = PagerShared {
                store: self.store.clone(),
                keys: self.keys.clone(),
                descriptor,
                operation: Operation::Scan,
                base_schema: self.schema.clone(),
                index_schema: None,
                segment: Some(SegmentId {
                    index: index as u32,
                    total: self.total,
                }),
            };
            let options = PagerOptions {
                limit: None,
                from: None,
                filter: self.options.filter.clone(),
                context: self.options.context.clone(),
            };
            self.engines.push(Pager::new(Arc::new(shared), options));
            self.active.insert(index);
            self.armed.push(false);
        }

        debug!(
            table = %self.descriptor.table,
            segments = self.total,
            "parallel scan prepared"
        );
        Ok(())
    }

    /// Put one fetch for the given segment into the race
    fn arm(&mut self, index: usize) {
        let store = self.store.clone();
        let request = self.engines[index].page_request();
        self.armed[index] = true;
        self.pending
            .push(Box::pin(async move { (index, store.fetch_page(request).await) }));
    }
}

/// Split a composite plaintext into per-segment starting keys.
///
/// Exactly `total` frames must be present, each `be32 length ‖ bytes`; a
/// zero length means the segment starts from scratch.
fn decode_composite(bytes: &[u8], total: u32) -> Result<Vec<Option<Key>>> {
    let mut out = Vec::with_capacity(total as usize);
    let mut cursor = bytes;

    for _ in 0..total {
        if cursor.len() < 4 {
            return Err(Error::Token);
        }
        let (len_bytes, rest) = cursor.split_at(4);
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        if rest.len() < len {
            return Err(Error::Token);
        }
        let (frame, rest) = rest.split_at(len);
        if frame.is_empty() {
            out.push(None);
        } else {
            out.push(Some(codec::unflatten(frame).map_err(|_| Error::Token)?));
        }
        cursor = rest;
    }

    if !cursor.is_empty() {
        return Err(Error::Token);
    }
    Ok(out)
}
