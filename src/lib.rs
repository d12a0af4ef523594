//! # dynapage
//!
//! Opaque, tamper-proof continuation tokens and resumable pagination for
//! DynamoDB-style key-value stores (partition key + optional sort key,
//! optional secondary indexes).
//!
//! ## Features
//!
//! - **Encrypted continuation tokens**: AES-256-CBC + truncated HMAC over
//!   a canonical key encoding, so clients never see raw key material and
//!   cannot steer a resumed query
//! - **Context binding**: tokens carry associated data (a user or session
//!   id) and refuse to open under any other context
//! - **Filtered pagination with minimum yield**: a client-side predicate
//!   plus a limit keeps fetching pages until the limit is met
//! - **Lookahead**: `peek` without consuming, without duplicate requests
//! - **Parallel scans**: N segments raced first-completed-wins behind one
//!   composite token
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Paginator                            │
//! │   query() → Pager     scan() → Pager                        │
//! │   parallel_scan(n) → ParallelScanner                        │
//! └─────────────────────────────────────────────────────────────┘
//!                │                          │
//! ┌──────────────┴──────────┐  ┌────────────┴───────────────────┐
//! │         Pager           │  │        ParallelScanner         │
//! │  buffer / pointers      │  │  N segment engines             │
//! │  filter / limit / peek  │  │  completion-order fan-in       │
//! └──────────────┬──────────┘  └────────────┬───────────────────┘
//!                │                          │
//! ┌──────────────┴──────────────────────────┴───────────────────┐
//! │     codec (flatten/unflatten)  ·  cipher (seal/open)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store itself is a collaborator behind the [`PageSource`] trait:
//! this crate issues page requests and never retries failures.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Common types and the store trait
pub mod types;

/// Canonical byte encoding of structured keys
pub mod codec;

/// Token cipher and key derivation
pub mod cipher;

/// Key schema configuration
pub mod schema;

/// The per-query pagination engine
pub mod engine;

/// The parallel scan coordinator
pub mod parallel;

/// The factory binding secret + store
mod paginator;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cipher::{Secret, SubKeys};
pub use engine::{FilterPredicate, Pager};
pub use error::{Error, Result};
pub use paginator::Paginator;
pub use parallel::ParallelScanner;
pub use schema::{IndexKeyResolver, KeySchema};
pub use types::{
    AttributeValue, Item, Key, KeyValue, Operation, PageRequest, PageResponse, PageSource,
    QueryDescriptor, SegmentId,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
