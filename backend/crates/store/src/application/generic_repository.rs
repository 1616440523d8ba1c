//! Generic Entity Repository
//!
//! CRUD, batch and transaction operations for any [`Entity`] over one named
//! collection of a [`DocumentStore`].
//!
//! ## Batch targeting
//! The three bulk-update variants are deliberately distinct:
//! - [`GenericRepository::bulk_write_update`]: one request, each entity
//!   filtered by its own id
//! - [`GenericRepository::bulk_update_by_filter`]: every entity applied to
//!   the same shared filter
//! - [`GenericRepository::bulk_update_one_by_id`]: one call per entity
//!
//! Every bulk operation rejects an empty batch with
//! [`StoreError::EmptyBatch`] before touching the store.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{Document, doc};
use kernel::id::EntityId;

use crate::domain::entity::{Entity, ID_FIELD, Identity, Timestamps, now};
use crate::domain::filter::Filter;
use crate::domain::store::{DocumentStore, Page, WriteOp};
use crate::error::{MutationKind, StoreError, StoreResult};

/// Repository bound to one entity type and one collection
pub struct GenericRepository<T, S>
where
    S: DocumentStore,
{
    store: Arc<S>,
    collection: String,
    session: Option<S::Session>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S> Clone for GenericRepository<T, S>
where
    S: DocumentStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            session: self.session.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, S> GenericRepository<T, S>
where
    T: Entity,
    S: DocumentStore,
{
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            session: None,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A clone whose operations run inside `session`
    pub fn in_session(&self, session: &S::Session) -> Self {
        Self {
            session: Some(session.clone()),
            ..self.clone()
        }
    }

    fn session(&self) -> Option<&S::Session> {
        self.session.as_ref()
    }

    fn mutation_failed(&self, op: MutationKind) -> StoreError {
        tracing::warn!(collection = %self.collection, op = %op, "Mutation affected no documents");
        StoreError::mutation(op, self.collection.clone())
    }

    fn ensure_not_empty<E>(&self, batch: &[E]) -> StoreResult<()> {
        if batch.is_empty() {
            return Err(StoreError::EmptyBatch(self.collection.clone()));
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// `None` when no document has this id
    pub async fn get_by_id(&self, id: &EntityId) -> StoreResult<Option<T>> {
        let found = self
            .store
            .find_one(&self.collection, id_filter(id), self.session())
            .await?;
        found.map(decode).transpose()
    }

    /// Page of entities matching all `filters`, plus the total match count.
    ///
    /// `total` ignores `limit`/`offset`. `limit == 0` returns no entities.
    pub async fn select(
        &self,
        limit: u64,
        offset: u64,
        filters: &[Filter],
    ) -> StoreResult<(u64, Vec<T>)> {
        let query = Filter::all(filters);

        let entities = if limit == 0 {
            Vec::new()
        } else {
            self.store
                .find(
                    &self.collection,
                    query.clone(),
                    Page::new(limit, offset),
                    self.session(),
                )
                .await?
                .into_iter()
                .map(decode)
                .collect::<StoreResult<Vec<T>>>()?
        };

        let total = self
            .store
            .count(&self.collection, query, self.session())
            .await?;

        Ok((total, entities))
    }

    pub async fn count_filter(&self, filter: &Filter) -> StoreResult<u64> {
        self.store
            .count(&self.collection, filter.to_document(), self.session())
            .await
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Fails with `InsertFailed` when the store reports no inserted id
    pub async fn insert(&self, entity: &T) -> StoreResult<()> {
        let document = encode(entity)?;
        let inserted = self
            .store
            .insert_one(&self.collection, document, self.session())
            .await?;

        if inserted.is_none() {
            return Err(self.mutation_failed(MutationKind::InsertFailed));
        }

        tracing::debug!(collection = %self.collection, id = %entity.id(), "Inserted entity");
        Ok(())
    }

    /// Stamps both timestamps on every entity, then inserts them in one request
    pub async fn bulk_insert(&self, entities: &mut [T]) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let stamp = now();
        let documents = entities
            .iter_mut()
            .map(|entity| {
                entity.stamp_created(stamp);
                encode(&*entity)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let inserted = self
            .store
            .insert_many(&self.collection, documents, self.session())
            .await?;

        let requested = entities.len() as u64;
        if inserted < requested {
            // Partial inserts follow the store's multi-insert semantics
            tracing::warn!(
                collection = %self.collection,
                requested,
                inserted,
                "Bulk insert acknowledged fewer documents than submitted"
            );
        } else {
            tracing::debug!(collection = %self.collection, inserted, "Bulk inserted entities");
        }
        Ok(())
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Stamps `updated_at` and replaces the document with the entity's id
    pub async fn update_by_id(&self, entity: &mut T) -> StoreResult<()> {
        entity.set_updated_at(now());
        let replacement = encode(&*entity)?;

        let outcome = self
            .store
            .replace_one(
                &self.collection,
                id_filter(entity.id()),
                replacement,
                self.session(),
            )
            .await?;

        if outcome.matched == 0 {
            return Err(self.mutation_failed(MutationKind::UpdateFailed));
        }
        Ok(())
    }

    /// One batch of `$set` updates, each filtered by its entity's id.
    ///
    /// Fails with `BulkUpdateFailed` when nothing matched in aggregate.
    pub async fn bulk_write_update(&self, entities: &mut [T]) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let stamp = now();
        let ops = entities
            .iter_mut()
            .map(|entity| {
                entity.set_updated_at(stamp);
                Ok(WriteOp::UpdateOne {
                    filter: id_filter(entity.id()),
                    update: set_update(&*entity)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let outcome = self
            .store
            .bulk_write(&self.collection, ops, self.session())
            .await?;

        if outcome.matched == 0 {
            return Err(self.mutation_failed(MutationKind::BulkUpdateFailed));
        }

        tracing::debug!(
            collection = %self.collection,
            matched = outcome.matched,
            modified = outcome.modified,
            "Bulk write update"
        );
        Ok(())
    }

    /// Apply each entity in order to every document matching `filters`.
    ///
    /// Meant for small batches sharing one selection criterion; later
    /// entities overwrite fields set by earlier ones.
    pub async fn bulk_update_by_filter(
        &self,
        filters: &[Filter],
        entities: &mut [T],
    ) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let query = Filter::all(filters);
        let stamp = now();
        for entity in entities.iter_mut() {
            entity.set_updated_at(stamp);
            let update = set_update(&*entity)?;
            self.store
                .update_many(&self.collection, query.clone(), update, self.session())
                .await?;
        }
        Ok(())
    }

    /// One `$set` update per entity, each scoped to that entity's id.
    ///
    /// Every entity is attempted; the last error encountered is returned.
    pub async fn bulk_update_one_by_id(&self, entities: &mut [T]) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let mut last_error = None;
        for entity in entities.iter_mut() {
            entity.set_updated_at(now());
            let result = match set_update(&*entity) {
                Ok(update) => {
                    self.store
                        .update_one(
                            &self.collection,
                            id_filter(entity.id()),
                            update,
                            self.session(),
                        )
                        .await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                tracing::warn!(collection = %self.collection, id = %entity.id(), error = %e, "Update by id failed");
                last_error = Some(e);
            }
        }

        last_error.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    pub async fn delete_by_id(&self, id: &EntityId) -> StoreResult<()> {
        let deleted = self
            .store
            .delete_one(&self.collection, id_filter(id), self.session())
            .await?;

        if deleted == 0 {
            return Err(self.mutation_failed(MutationKind::DeleteFailed));
        }
        Ok(())
    }

    /// One batch of id-filtered deletes; `BulkDeleteFailed` when none removed
    pub async fn bulk_write_delete(&self, entities: &[T]) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let ops = entities
            .iter()
            .map(|entity| WriteOp::DeleteOne {
                filter: id_filter(entity.id()),
            })
            .collect();

        let outcome = self
            .store
            .bulk_write(&self.collection, ops, self.session())
            .await?;

        if outcome.deleted == 0 {
            return Err(self.mutation_failed(MutationKind::BulkDeleteFailed));
        }

        tracing::debug!(collection = %self.collection, deleted = outcome.deleted, "Bulk write delete");
        Ok(())
    }

    /// Remove every document matching `filters`; `DeleteFailed` when none
    pub async fn bulk_delete_many_by_filter(&self, filters: &[Filter]) -> StoreResult<()> {
        self.ensure_not_empty(filters)?;

        let deleted = self
            .store
            .delete_many(&self.collection, Filter::all(filters), self.session())
            .await?;

        if deleted == 0 {
            return Err(self.mutation_failed(MutationKind::DeleteFailed));
        }
        Ok(())
    }

    /// One delete per entity id; every entity is attempted, last error wins
    pub async fn bulk_delete_one_by_id(&self, entities: &[T]) -> StoreResult<()> {
        self.ensure_not_empty(entities)?;

        let mut last_error = None;
        for entity in entities {
            if let Err(e) = self
                .store
                .delete_many(&self.collection, id_filter(entity.id()), self.session())
                .await
            {
                tracing::warn!(collection = %self.collection, id = %entity.id(), error = %e, "Delete by id failed");
                last_error = Some(e);
            }
        }

        last_error.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub async fn start_session(&self) -> StoreResult<S::Session> {
        self.store.start_session().await
    }

    pub async fn start_transaction(&self, session: &S::Session) -> StoreResult<()> {
        self.store.start_transaction(session).await
    }

    pub async fn commit_transaction(&self, session: &S::Session) -> StoreResult<()> {
        self.store.commit_transaction(session).await
    }

    pub async fn abort_transaction(&self, session: &S::Session) -> StoreResult<()> {
        self.store.abort_transaction(session).await
    }

    pub async fn end_session(&self, session: S::Session) {
        self.store.end_session(session).await
    }

    /// Run `f` in a fresh transaction.
    ///
    /// `f` receives a session-bound clone of this repository. The
    /// transaction commits when `f` returns `Ok` and aborts otherwise; the
    /// session is ended on every path.
    pub async fn with_transaction<F, Fut, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<StoreError>,
    {
        let session = self.start_session().await?;

        if let Err(e) = self.start_transaction(&session).await {
            self.end_session(session).await;
            return Err(e.into());
        }

        let outcome = match f(self.in_session(&session)).await {
            Ok(value) => match self.commit_transaction(&session).await {
                Ok(()) => Ok(value),
                Err(e) => Err(e.into()),
            },
            Err(e) => {
                if let Err(abort_err) = self.abort_transaction(&session).await {
                    tracing::warn!(collection = %self.collection, error = %abort_err, "Abort transaction failed");
                }
                Err(e)
            }
        };

        self.end_session(session).await;
        outcome
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn id_filter(id: &EntityId) -> Document {
    Filter::by_id(id).to_document()
}

fn encode<T: Entity>(entity: &T) -> StoreResult<Document> {
    Ok(bson::to_document(entity)?)
}

fn decode<T: Entity>(document: Document) -> StoreResult<T> {
    Ok(bson::from_document(document)?)
}

/// `{"$set": entity}` without the immutable id
fn set_update<T: Entity>(entity: &T) -> StoreResult<Document> {
    let mut fields = encode(entity)?;
    fields.remove(ID_FIELD);
    Ok(doc! { "$set": fields })
}
