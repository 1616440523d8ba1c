//! In-memory `DocumentStore`
//!
//! Good enough to exercise repository semantics without a server:
//! equality filters (dotted paths, `$and`, array membership), `$set`
//! updates, ordered batches and snapshot-based transactions.
//!
//! Transactions are not isolated. Starting one snapshots every collection;
//! aborting, or ending the session with the transaction still open,
//! restores that snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bson::oid::ObjectId;
use bson::{Bson, Document};

use crate::domain::entity::ID_FIELD;
use crate::domain::store::{BulkOutcome, DocumentStore, Page, UpdateOutcome, WriteOp};
use crate::error::{StoreError, StoreResult};

type Collections = HashMap<String, Vec<Document>>;

#[derive(Debug, Clone)]
pub struct MemorySession {
    id: u64,
    snapshot: Arc<Mutex<Option<Collections>>>,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn in_transaction(&self) -> bool {
        lock(&self.snapshot).is_some()
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    next_session: AtomicU64,
    acknowledge_inserts: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            acknowledge_inserts: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When false, inserts store documents but report nothing inserted
    pub fn set_acknowledge_inserts(&self, acknowledge: bool) {
        self.acknowledge_inserts.store(acknowledge, Ordering::SeqCst);
    }

    /// Number of data operations received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copy of every document in `collection`, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn data(&self) -> MutexGuard<'_, Collections> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.collections)
    }

    fn insert_into(docs: &mut Vec<Document>, mut document: Document) -> StoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(StoreError::Backend(format!("duplicate key: {id}")));
        }
        docs.push(document);
        Ok(id)
    }
}

// ============================================================================
// Matching & updates
// ============================================================================

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        if key == "$and" {
            return match expected {
                Bson::Array(clauses) => clauses
                    .iter()
                    .all(|c| matches!(c, Bson::Document(d) if matches(doc, d))),
                _ => false,
            };
        }
        match lookup(doc, key) {
            Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
                items.contains(expected)
            }
            Some(actual) => actual == expected,
            None => matches!(expected, Bson::Null),
        }
    })
}

fn set_path(doc: &mut Document, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => {
            let changed = doc.get(path) != Some(&value);
            doc.insert(path, value);
            changed
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => false,
            }
        }
    }
}

/// Returns whether the document changed
fn apply_update(doc: &mut Document, update: &Document) -> StoreResult<bool> {
    let mut changed = false;
    for (op, fields) in update {
        match (op.as_str(), fields) {
            ("$set", Bson::Document(fields)) => {
                for (key, value) in fields {
                    if key == ID_FIELD && doc.get(ID_FIELD) != Some(value) {
                        return Err(StoreError::Backend("_id is immutable".to_string()));
                    }
                    changed |= set_path(doc, key, value.clone());
                }
            }
            _ => {
                return Err(StoreError::Backend(format!(
                    "unsupported update operator {op}"
                )));
            }
        }
    }
    Ok(changed)
}

fn update_matching(
    docs: &mut [Document],
    filter: &Document,
    update: &Document,
    limit_one: bool,
) -> StoreResult<UpdateOutcome> {
    let mut outcome = UpdateOutcome::default();
    for doc in docs.iter_mut().filter(|d| matches(d, filter)) {
        outcome.matched += 1;
        if apply_update(doc, update)? {
            outcome.modified += 1;
        }
        if limit_one {
            break;
        }
    }
    Ok(outcome)
}

fn delete_matching(docs: &mut Vec<Document>, filter: &Document, limit_one: bool) -> u64 {
    if limit_one {
        return match docs.iter().position(|d| matches(d, filter)) {
            Some(index) => {
                docs.remove(index);
                1
            }
            None => 0,
        };
    }
    let before = docs.len();
    docs.retain(|d| !matches(d, filter));
    (before - docs.len()) as u64
}

// ============================================================================
// DocumentStore
// ============================================================================

impl DocumentStore for MemoryStore {
    type Session = MemorySession;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<Option<Document>> {
        let data = self.data();
        Ok(data
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
        _session: Option<&MemorySession>,
    ) -> StoreResult<Vec<Document>> {
        let data = self.data();
        let take = if page.limit == 0 {
            usize::MAX
        } else {
            usize::try_from(page.limit).unwrap_or(usize::MAX)
        };
        let skip = usize::try_from(page.offset).unwrap_or(usize::MAX);

        Ok(data
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches(d, &filter))
                    .skip(skip)
                    .take(take)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        let data = self.data();
        Ok(data
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<Option<Bson>> {
        let mut data = self.data();
        let docs = data.entry(collection.to_string()).or_default();
        let id = Self::insert_into(docs, document)?;

        if self.acknowledge_inserts.load(Ordering::SeqCst) {
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        _session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        let mut data = self.data();
        let docs = data.entry(collection.to_string()).or_default();
        let mut inserted = 0;
        for document in documents {
            Self::insert_into(docs, document)?;
            inserted += 1;
        }

        if self.acknowledge_inserts.load(Ordering::SeqCst) {
            Ok(inserted)
        } else {
            Ok(0)
        }
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        mut replacement: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<UpdateOutcome> {
        let mut data = self.data();
        let Some(doc) = data
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, &filter)))
        else {
            return Ok(UpdateOutcome::default());
        };

        let id = doc.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        match replacement.get(ID_FIELD) {
            Some(new_id) if *new_id != id => {
                return Err(StoreError::Backend("_id is immutable".to_string()));
            }
            Some(_) => {}
            None => {
                replacement.insert(ID_FIELD, id);
            }
        }

        let modified = *doc != replacement;
        *doc = replacement;
        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<UpdateOutcome> {
        let mut data = self.data();
        match data.get_mut(collection) {
            Some(docs) => update_matching(docs, &filter, &update, true),
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<UpdateOutcome> {
        let mut data = self.data();
        match data.get_mut(collection) {
            Some(docs) => update_matching(docs, &filter, &update, false),
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        let mut data = self.data();
        Ok(data
            .get_mut(collection)
            .map(|docs| delete_matching(docs, &filter, true))
            .unwrap_or(0))
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        let mut data = self.data();
        Ok(data
            .get_mut(collection)
            .map(|docs| delete_matching(docs, &filter, false))
            .unwrap_or(0))
    }

    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        _session: Option<&MemorySession>,
    ) -> StoreResult<BulkOutcome> {
        let mut data = self.data();
        let docs = data.entry(collection.to_string()).or_default();

        let mut outcome = BulkOutcome::default();
        for op in ops {
            match op {
                WriteOp::UpdateOne { filter, update } => {
                    let result = update_matching(docs, &filter, &update, true)?;
                    outcome.matched += result.matched;
                    outcome.modified += result.modified;
                }
                WriteOp::DeleteOne { filter } => {
                    outcome.deleted += delete_matching(docs, &filter, true);
                }
            }
        }
        Ok(outcome)
    }

    async fn start_session(&self) -> StoreResult<MemorySession> {
        Ok(MemorySession {
            id: self.next_session.fetch_add(1, Ordering::SeqCst),
            snapshot: Arc::new(Mutex::new(None)),
        })
    }

    async fn start_transaction(&self, session: &MemorySession) -> StoreResult<()> {
        let mut snapshot = lock(&session.snapshot);
        if snapshot.is_some() {
            return Err(StoreError::Transaction(
                "transaction already in progress".to_string(),
            ));
        }
        *snapshot = Some(lock(&self.collections).clone());
        Ok(())
    }

    async fn commit_transaction(&self, session: &MemorySession) -> StoreResult<()> {
        match lock(&session.snapshot).take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Transaction("no transaction started".to_string())),
        }
    }

    async fn abort_transaction(&self, session: &MemorySession) -> StoreResult<()> {
        match lock(&session.snapshot).take() {
            Some(saved) => {
                *lock(&self.collections) = saved;
                Ok(())
            }
            None => Err(StoreError::Transaction("no transaction started".to_string())),
        }
    }

    async fn end_session(&self, session: MemorySession) {
        if let Some(saved) = lock(&session.snapshot).take() {
            tracing::debug!(session = session.id, "Session ended inside a transaction, rolling back");
            *lock(&self.collections) = saved;
        }
    }
}
