//! Document storage for the agency service.
//!
//! Every entity lives as a JSON document in a named [`Collection`]. The
//! [`DocumentStore`] trait is the only way handlers reach persisted state;
//! [`PgDocumentStore`] keeps documents in a single Postgres JSONB table and
//! [`MemoryStore`] keeps them in process for tests and local runs.

mod config;
mod document;
mod error;
mod memory;
mod migrations;
mod postgres;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub use config::StoreConfig;
pub use document::{Collection, StoredDocument};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use query::{Field, Filter, FindQuery, Page, Sort, SortKey};

/// Single-document operations over collections. Writes never span more than
/// one document; concurrent writers to the same document race and the last
/// one wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores a new document with a fresh id. Fails with
    /// [`StoreError::Conflict`] if a unique field collides; nothing is written.
    async fn insert(&self, collection: &Collection, data: Value) -> StoreResult<StoredDocument>;

    async fn get(&self, collection: &Collection, id: Uuid) -> StoreResult<Option<StoredDocument>>;

    /// Documents for the ids that exist, in id order. Unknown ids are skipped.
    async fn get_many(&self, collection: &Collection, ids: &[Uuid]) -> StoreResult<Vec<StoredDocument>>;

    async fn find_one(&self, collection: &Collection, filter: &Filter) -> StoreResult<Option<StoredDocument>>;

    async fn find(&self, collection: &Collection, query: &FindQuery) -> StoreResult<Page>;

    async fn count(&self, collection: &Collection, filter: &Filter) -> StoreResult<u64>;

    /// Replaces the body of an existing document and bumps `updated_at`.
    /// Returns `None` when the id is unknown.
    async fn replace(&self, collection: &Collection, id: Uuid, data: Value) -> StoreResult<Option<StoredDocument>>;

    async fn delete(&self, collection: &Collection, id: Uuid) -> StoreResult<bool>;

    /// Atomically increments the named counter and returns the new value,
    /// starting at 1. Values are never handed out twice.
    async fn next_sequence(&self, name: &str) -> StoreResult<u64>;
}

pub type SharedStore = Arc<dyn DocumentStore>;
