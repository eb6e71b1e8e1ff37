//! Storage and catalog capabilities
//!
//! Plans never hold storage objects across a wire boundary. They carry
//! names, and decoding re-resolves them through a `Catalog`:
//! keyspace by namespace and name, indexer by index type, index by name.
//!
//! `memory` provides an in-process implementation with collation-ordered
//! index trees.

mod btree;
mod errors;
mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expression;
use crate::planner::Inclusion;

pub use btree::{IndexKey, IndexTree};
pub use errors::{DatastoreError, DatastoreResult};
pub use memory::{MemoryCatalog, MemoryIndex, MemoryIndexer, MemoryKeyspace};

/// Index implementation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Global secondary index
    Gsi,
    /// Map/reduce view index
    View,
}

impl Default for IndexType {
    fn default() -> Self {
        IndexType::Gsi
    }
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Gsi => "gsi",
            IndexType::View => "view",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = DatastoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gsi" => Ok(IndexType::Gsi),
            "view" => Ok(IndexType::View),
            other => Err(DatastoreError::UnsupportedIndexType(other.to_string())),
        }
    }
}

/// Span with its bounds evaluated to values
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSpan {
    pub seek: Option<Vec<Value>>,
    pub low: Vec<Value>,
    pub high: Vec<Value>,
    pub inclusion: Inclusion,
}

impl ScanSpan {
    pub fn full() -> Self {
        Self {
            seek: None,
            low: Vec::new(),
            high: Vec::new(),
            inclusion: Inclusion::Both,
        }
    }
}

/// One index row: the key values and the id of the document behind them
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: Vec<Value>,
    pub primary_key: String,
}

impl IndexEntry {
    pub fn new(key: Vec<Value>, primary_key: impl Into<String>) -> Self {
        Self {
            key,
            primary_key: primary_key.into(),
        }
    }
}

/// Resolves keyspaces by namespace and name
pub trait Catalog: Send + Sync {
    fn keyspace(&self, namespace: &str, name: &str) -> DatastoreResult<Arc<dyn Keyspace>>;
}

/// A named document collection
pub trait Keyspace: Send + Sync {
    fn namespace(&self) -> &str;

    fn name(&self) -> &str;

    /// Indexer for one index type
    fn indexer(&self, using: IndexType) -> DatastoreResult<Arc<dyn Indexer>>;

    /// Every indexer this keyspace supports
    fn indexers(&self) -> Vec<Arc<dyn Indexer>>;

    /// Documents for the given ids, in the given order; unknown ids are skipped
    fn fetch(&self, ids: &[String]) -> DatastoreResult<Vec<(String, Value)>>;

    /// Document ids in ascending order
    fn primary_keys(&self, limit: Option<usize>) -> DatastoreResult<Vec<String>>;

    fn create_index(
        &self,
        name: &str,
        equal_key: Option<&Expression>,
        keys: &[Expression],
        condition: Option<&Expression>,
        using: IndexType,
    ) -> DatastoreResult<()>;
}

/// Index lookup for one index type
pub trait Indexer: Send + Sync {
    fn using(&self) -> IndexType;

    fn index_by_name(&self, name: &str) -> DatastoreResult<Arc<dyn Index>>;

    /// All indexes, ordered by name
    fn indexes(&self) -> Vec<Arc<dyn Index>>;
}

/// A secondary index
pub trait Index: Send + Sync {
    fn name(&self) -> &str;

    fn keyspace_name(&self) -> &str;

    fn using(&self) -> IndexType;

    /// Partition key, if any
    fn equal_key(&self) -> Option<&Expression>;

    /// Key expressions, leading component first
    fn range_key(&self) -> &[Expression];

    /// Only documents satisfying this condition are indexed
    fn condition(&self) -> Option<&Expression>;

    fn scan(
        &self,
        span: &ScanSpan,
        distinct: bool,
        limit: Option<usize>,
    ) -> DatastoreResult<Vec<IndexEntry>>;
}

impl fmt::Debug for dyn Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name())
            .field("keyspace", &self.keyspace_name())
            .field("using", &self.using())
            .finish()
    }
}

impl fmt::Debug for dyn Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyspace")
            .field("namespace", &self.namespace())
            .field("name", &self.name())
            .finish()
    }
}

/// Two handles name the same keyspace
pub fn same_keyspace(a: &dyn Keyspace, b: &dyn Keyspace) -> bool {
    a.namespace() == b.namespace() && a.name() == b.name()
}

/// Two handles name the same index
pub fn same_index(a: &dyn Index, b: &dyn Index) -> bool {
    a.name() == b.name() && a.keyspace_name() == b.keyspace_name() && a.using() == b.using()
}
