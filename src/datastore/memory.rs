//! In-memory catalog
//!
//! Documents live in a `BTreeMap` per keyspace; every index keeps an
//! `IndexTree` that is updated on each write. Only the `gsi` index type is
//! supported.
//!
//! A document is left out of an index when its leading key is MISSING, when
//! the index condition is not TRUE, or when a key expression fails to
//! evaluate against it.
//!
//! Lock order: documents, then the index map, then an index tree.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::btree::{IndexKey, IndexTree};
use super::errors::{DatastoreError, DatastoreResult};
use super::{Catalog, Index, IndexEntry, IndexType, Indexer, Keyspace, ScanSpan};
use crate::expr::{is_true, Bindings, Expression};

fn read<T>(lock: &RwLock<T>) -> DatastoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| DatastoreError::Internal("lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> DatastoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| DatastoreError::Internal("lock poisoned".into()))
}

/// Keyspaces keyed by (namespace, name)
#[derive(Default)]
pub struct MemoryCatalog {
    keyspaces: RwLock<BTreeMap<(String, String), Arc<MemoryKeyspace>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keyspace, creating it empty if needed
    pub fn add_keyspace(&self, namespace: &str, name: &str) -> DatastoreResult<Arc<MemoryKeyspace>> {
        let mut keyspaces = write(&self.keyspaces)?;
        let ks = keyspaces
            .entry((namespace.to_string(), name.to_string()))
            .or_insert_with(|| Arc::new(MemoryKeyspace::new(namespace, name)));
        Ok(Arc::clone(ks))
    }

    pub fn memory_keyspace(&self, namespace: &str, name: &str) -> DatastoreResult<Arc<MemoryKeyspace>> {
        read(&self.keyspaces)?
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| DatastoreError::keyspace_not_found(namespace, name))
    }
}

impl Catalog for MemoryCatalog {
    fn keyspace(&self, namespace: &str, name: &str) -> DatastoreResult<Arc<dyn Keyspace>> {
        let ks: Arc<dyn Keyspace> = self.memory_keyspace(namespace, name)?;
        Ok(ks)
    }
}

pub struct MemoryKeyspace {
    namespace: String,
    name: String,
    docs: RwLock<BTreeMap<String, Value>>,
    gsi: Arc<MemoryIndexer>,
}

impl MemoryKeyspace {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            namespace: namespace.into(),
            gsi: Arc::new(MemoryIndexer::new(IndexType::Gsi, name.clone())),
            name,
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts or replaces a document and updates every index
    pub fn insert(&self, id: &str, doc: Value) -> DatastoreResult<()> {
        let mut docs = write(&self.docs)?;
        let indexes = read(&self.gsi.indexes)?;
        for index in indexes.values() {
            if let Some(old) = docs.get(id) {
                index.unindex(id, old)?;
            }
            index.index(id, &doc)?;
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> DatastoreResult<Option<Value>> {
        let mut docs = write(&self.docs)?;
        let Some(old) = docs.remove(id) else {
            return Ok(None);
        };
        for index in read(&self.gsi.indexes)?.values() {
            index.unindex(id, &old)?;
        }
        Ok(Some(old))
    }

    pub fn len(&self) -> usize {
        read(&self.docs).map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Keyspace for MemoryKeyspace {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn indexer(&self, using: IndexType) -> DatastoreResult<Arc<dyn Indexer>> {
        match using {
            IndexType::Gsi => {
                let indexer: Arc<dyn Indexer> = self.gsi.clone();
                Ok(indexer)
            }
            other => Err(DatastoreError::UnsupportedIndexType(other.to_string())),
        }
    }

    fn indexers(&self) -> Vec<Arc<dyn Indexer>> {
        vec![self.gsi.clone()]
    }

    fn fetch(&self, ids: &[String]) -> DatastoreResult<Vec<(String, Value)>> {
        let docs = read(&self.docs)?;
        Ok(ids
            .iter()
            .filter_map(|id| docs.get(id).map(|doc| (id.clone(), doc.clone())))
            .collect())
    }

    fn primary_keys(&self, limit: Option<usize>) -> DatastoreResult<Vec<String>> {
        let docs = read(&self.docs)?;
        Ok(docs
            .keys()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn create_index(
        &self,
        name: &str,
        equal_key: Option<&Expression>,
        keys: &[Expression],
        condition: Option<&Expression>,
        using: IndexType,
    ) -> DatastoreResult<()> {
        if using != IndexType::Gsi {
            return Err(DatastoreError::UnsupportedIndexType(using.to_string()));
        }
        if keys.is_empty() {
            return Err(DatastoreError::CreateFailed(format!(
                "index {} needs at least one key",
                name
            )));
        }

        let docs = read(&self.docs)?;
        let mut indexes = write(&self.gsi.indexes)?;
        if indexes.contains_key(name) {
            return Err(DatastoreError::IndexExists(name.to_string()));
        }

        let index = MemoryIndex {
            name: name.to_string(),
            keyspace: self.name.clone(),
            using,
            equal_key: equal_key.cloned(),
            range_key: keys.to_vec(),
            condition: condition.cloned(),
            tree: RwLock::new(IndexTree::new()),
        };
        for (id, doc) in docs.iter() {
            index.index(id, doc)?;
        }
        indexes.insert(name.to_string(), Arc::new(index));
        Ok(())
    }
}

pub struct MemoryIndexer {
    using: IndexType,
    keyspace: String,
    indexes: RwLock<BTreeMap<String, Arc<MemoryIndex>>>,
}

impl MemoryIndexer {
    fn new(using: IndexType, keyspace: String) -> Self {
        Self {
            using,
            keyspace,
            indexes: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Indexer for MemoryIndexer {
    fn using(&self) -> IndexType {
        self.using
    }

    fn index_by_name(&self, name: &str) -> DatastoreResult<Arc<dyn Index>> {
        let index: Arc<dyn Index> = read(&self.indexes)?
            .get(name)
            .cloned()
            .ok_or_else(|| DatastoreError::IndexNotFound(format!("{}.{}", self.keyspace, name)))?;
        Ok(index)
    }

    fn indexes(&self) -> Vec<Arc<dyn Index>> {
        read(&self.indexes)
            .map(|m| m.values().map(|i| i.clone() as Arc<dyn Index>).collect())
            .unwrap_or_default()
    }
}

pub struct MemoryIndex {
    name: String,
    keyspace: String,
    using: IndexType,
    equal_key: Option<Expression>,
    range_key: Vec<Expression>,
    condition: Option<Expression>,
    tree: RwLock<IndexTree>,
}

impl MemoryIndex {
    /// Key for `doc`, or `None` when the document is not indexed
    fn key_for(&self, doc: &Value) -> Option<IndexKey> {
        let bindings = Bindings::default();
        if let Some(cond) = &self.condition {
            if !is_true(&cond.evaluate(doc, &bindings).ok()?) {
                return None;
            }
        }
        let mut values = Vec::with_capacity(self.range_key.len());
        for (i, expr) in self.range_key.iter().enumerate() {
            match expr.evaluate(doc, &bindings).ok()? {
                Some(v) => values.push(v),
                None if i == 0 => return None,
                None => values.push(Value::Null),
            }
        }
        Some(IndexKey(values))
    }

    fn index(&self, id: &str, doc: &Value) -> DatastoreResult<()> {
        if let Some(key) = self.key_for(doc) {
            write(&self.tree)?.insert(key, id);
        }
        Ok(())
    }

    fn unindex(&self, id: &str, doc: &Value) -> DatastoreResult<()> {
        if let Some(key) = self.key_for(doc) {
            write(&self.tree)?.remove(&key, id);
        }
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        read(&self.tree).map(|t| t.entry_count()).unwrap_or(0)
    }
}

impl Index for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn keyspace_name(&self) -> &str {
        &self.keyspace
    }

    fn using(&self) -> IndexType {
        self.using
    }

    fn equal_key(&self) -> Option<&Expression> {
        self.equal_key.as_ref()
    }

    fn range_key(&self) -> &[Expression] {
        &self.range_key
    }

    fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    fn scan(
        &self,
        span: &ScanSpan,
        distinct: bool,
        limit: Option<usize>,
    ) -> DatastoreResult<Vec<IndexEntry>> {
        let tree = read(&self.tree)?;
        if !distinct {
            return Ok(tree.scan(span, limit));
        }
        let mut seen = HashSet::new();
        let mut entries = tree.scan(span, None);
        entries.retain(|e| seen.insert(e.primary_key.clone()));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
