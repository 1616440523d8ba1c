//! MongoDB implementation of `DocumentStore`
//!
//! Owns one driver `Client` (itself a connection pool) and a default
//! database. Batches are sent as raw `update`/`delete` commands so they run
//! as a single round trip on every server version.

use std::sync::Arc;

use ::mongodb::options::{ClientOptions, Credential};
use ::mongodb::{Client, ClientSession, Collection, Database};
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use tokio::sync::Mutex;

use crate::application::config::MongoConfig;
use crate::domain::store::{BulkOutcome, DocumentStore, Page, UpdateOutcome, WriteOp};
use crate::error::{StoreError, StoreResult};

/// Shared handle to a driver session
///
/// The driver needs `&mut ClientSession` per operation, so clones share the
/// session behind an async mutex.
#[derive(Clone)]
pub struct MongoSession(Arc<Mutex<ClientSession>>);

impl std::fmt::Debug for MongoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MongoSession")
    }
}

/// MongoDB document store client
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
}

impl MongoClient {
    /// Connect and verify the connection with a ping
    pub async fn connect(config: &MongoConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(config.connection_uri()).await?;
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);
        options.app_name = Some(config.app_name.clone());

        if config.has_credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(config.username.clone())
                    .password(config.password.clone())
                    .source(config.auth_database.clone())
                    .build(),
            );
        }

        let client = Client::with_options(options)?;
        let this = Self::from_client(client, &config.database);
        this.ping().await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to MongoDB"
        );

        Ok(this)
    }

    pub fn from_client(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    pub async fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    /// Create any of `names` that does not exist yet
    pub async fn ensure_collections(&self, names: &[&str]) -> StoreResult<()> {
        let existing = self.collection_names().await?;
        for name in names {
            if !existing.iter().any(|e| e == name) {
                self.database.create_collection(*name).await?;
                tracing::info!(collection = %name, "Created collection");
            }
        }
        Ok(())
    }

    /// Close every pooled connection
    pub async fn disconnect(self) {
        self.client.shutdown().await;
        tracing::info!("Disconnected from MongoDB");
    }

    async fn run_batch(
        &self,
        command: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<Document> {
        let reply = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                self.database.run_command(command).session(&mut *guard).await?
            }
            None => self.database.run_command(command).await?,
        };

        if let Ok(errors) = reply.get_array("writeErrors") {
            if let Some(Bson::Document(first)) = errors.first() {
                let message = first.get_str("errmsg").unwrap_or("write error");
                return Err(StoreError::Backend(format!(
                    "{} of batch failed: {}",
                    errors.len(),
                    message
                )));
            }
        }
        Ok(reply)
    }
}

impl std::fmt::Debug for MongoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoClient")
            .field("database", &self.database.name())
            .finish()
    }
}

/// Read a numeric reply field the server may send as int32 or int64
fn reply_count(reply: &Document, key: &str) -> u64 {
    match reply.get(key) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(n)) if *n >= 0.0 => *n as u64,
        _ => 0,
    }
}

/// Group `ops` into raw `update`/`delete` commands, one per run of
/// consecutive ops of the same kind, preserving their order
fn batch_commands(collection: &str, ops: Vec<WriteOp>) -> Vec<Document> {
    let mut commands = Vec::new();
    let mut updates: Vec<Bson> = Vec::new();
    let mut deletes: Vec<Bson> = Vec::new();

    for op in ops {
        match op {
            WriteOp::UpdateOne { filter, update } => {
                if !deletes.is_empty() {
                    commands.push(delete_command(collection, std::mem::take(&mut deletes)));
                }
                updates.push(Bson::Document(doc! { "q": filter, "u": update, "multi": false }));
            }
            WriteOp::DeleteOne { filter } => {
                if !updates.is_empty() {
                    commands.push(update_command(collection, std::mem::take(&mut updates)));
                }
                deletes.push(Bson::Document(doc! { "q": filter, "limit": 1 }));
            }
        }
    }

    if !updates.is_empty() {
        commands.push(update_command(collection, updates));
    }
    if !deletes.is_empty() {
        commands.push(delete_command(collection, deletes));
    }
    commands
}

fn update_command(collection: &str, updates: Vec<Bson>) -> Document {
    doc! { "update": collection, "updates": updates, "ordered": true }
}

fn delete_command(collection: &str, deletes: Vec<Bson>) -> Document {
    doc! { "delete": collection, "deletes": deletes, "ordered": true }
}

impl DocumentStore for MongoClient {
    type Session = MongoSession;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<Option<Document>> {
        let coll = self.collection(collection);
        let found = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.find_one(filter).session(&mut *guard).await?
            }
            None => coll.find_one(filter).await?,
        };
        Ok(found)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        page: Page,
        session: Option<&MongoSession>,
    ) -> StoreResult<Vec<Document>> {
        let coll = self.collection(collection);
        let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);

        let documents: Vec<Document> = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                let mut cursor = coll
                    .find(filter)
                    .limit(limit)
                    .skip(page.offset)
                    .session(&mut *guard)
                    .await?;
                cursor.stream(&mut guard).try_collect().await?
            }
            None => {
                coll.find(filter)
                    .limit(limit)
                    .skip(page.offset)
                    .await?
                    .try_collect()
                    .await?
            }
        };
        Ok(documents)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let coll = self.collection(collection);
        let total = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.count_documents(filter).session(&mut *guard).await?
            }
            None => coll.count_documents(filter).await?,
        };
        Ok(total)
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<Option<Bson>> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.insert_one(document).session(&mut *guard).await?
            }
            None => coll.insert_one(document).await?,
        };
        Ok(match result.inserted_id {
            Bson::Null => None,
            id => Some(id),
        })
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.insert_many(documents).session(&mut *guard).await?
            }
            None => coll.insert_many(documents).await?,
        };
        Ok(result.inserted_ids.len() as u64)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<UpdateOutcome> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.replace_one(filter, replacement)
                    .session(&mut *guard)
                    .await?
            }
            None => coll.replace_one(filter, replacement).await?,
        };
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<UpdateOutcome> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.update_one(filter, update).session(&mut *guard).await?
            }
            None => coll.update_one(filter, update).await?,
        };
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<UpdateOutcome> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.update_many(filter, update).session(&mut *guard).await?
            }
            None => coll.update_many(filter, update).await?,
        };
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.delete_one(filter).session(&mut *guard).await?
            }
            None => coll.delete_one(filter).await?,
        };
        Ok(result.deleted_count)
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let coll = self.collection(collection);
        let result = match session {
            Some(s) => {
                let mut guard = s.0.lock().await;
                coll.delete_many(filter).session(&mut *guard).await?
            }
            None => coll.delete_many(filter).await?,
        };
        Ok(result.deleted_count)
    }

    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        session: Option<&MongoSession>,
    ) -> StoreResult<BulkOutcome> {
        let mut outcome = BulkOutcome::default();
        for command in batch_commands(collection, ops) {
            let is_update = command.contains_key("update");
            let reply = self.run_batch(command, session).await?;
            if is_update {
                outcome.matched += reply_count(&reply, "n");
                outcome.modified += reply_count(&reply, "nModified");
            } else {
                outcome.deleted += reply_count(&reply, "n");
            }
        }

        Ok(outcome)
    }

    async fn start_session(&self) -> StoreResult<MongoSession> {
        let session = self.client.start_session().await?;
        Ok(MongoSession(Arc::new(Mutex::new(session))))
    }

    async fn start_transaction(&self, session: &MongoSession) -> StoreResult<()> {
        session.0.lock().await.start_transaction().await?;
        Ok(())
    }

    async fn commit_transaction(&self, session: &MongoSession) -> StoreResult<()> {
        session.0.lock().await.commit_transaction().await?;
        Ok(())
    }

    async fn abort_transaction(&self, session: &MongoSession) -> StoreResult<()> {
        session.0.lock().await.abort_transaction().await?;
        Ok(())
    }

    async fn end_session(&self, session: MongoSession) {
        // The driver aborts an open transaction when the last handle drops
        drop(session);
    }
}
