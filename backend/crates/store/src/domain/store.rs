//! Document store seam
//!
//! The operations a repository needs from a document database, expressed
//! over raw BSON documents. Every data operation names its collection and
//! optionally runs inside a session obtained from [`DocumentStore::start_session`].

use std::future::Future;

use bson::{Bson, Document};

use crate::error::StoreResult;

/// Pagination window for `find`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
}

/// One entry of a heterogeneous batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    UpdateOne { filter: Document, update: Document },
    DeleteOne { filter: Document },
}

pub trait DocumentStore: Send + Sync + 'static {
    /// Handle to a server-side session; clones refer to the same session
    type Session: Clone + Send + Sync + 'static;

    fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// `page.limit == 0` means no limit
    fn find(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Returns the identifier the store reports for the new document
    fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<Option<Bson>>> + Send;

    /// Returns the number of inserted documents
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<UpdateOutcome>> + Send;

    fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<UpdateOutcome>> + Send;

    fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<UpdateOutcome>> + Send;

    /// Returns the number of deleted documents
    fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Execute `ops` in order; consecutive ops of one kind may share a request
    fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        session: Option<&Self::Session>,
    ) -> impl Future<Output = StoreResult<BulkOutcome>> + Send;

    // ------------------------------------------------------------------------
    // Sessions & transactions
    // ------------------------------------------------------------------------

    fn start_session(&self) -> impl Future<Output = StoreResult<Self::Session>> + Send;

    fn start_transaction(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn commit_transaction(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn abort_transaction(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Release the session; an open transaction is aborted
    fn end_session(&self, session: Self::Session) -> impl Future<Output = ()> + Send;
}
