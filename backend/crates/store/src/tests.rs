//! Unit tests for the store crate
//!
//! Repository semantics are exercised against `MemoryStore`.

#[cfg(test)]
mod fixtures {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    use crate::{EntityId, impl_entity, now};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Contact {
        #[serde(rename = "_id")]
        pub id: EntityId,
        #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
        pub created_at: DateTime<Utc>,
        #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
        pub updated_at: DateTime<Utc>,
        pub name: String,
        pub segment: String,
    }

    impl_entity!(Contact);

    pub fn contact(id: &str, name: &str, segment: &str) -> Contact {
        let at = now();
        Contact {
            id: EntityId::from(id),
            created_at: at,
            updated_at: at,
            name: name.to_string(),
            segment: segment.to_string(),
        }
    }
}

#[cfg(test)]
mod query_tests {
    use std::sync::Arc;

    use super::fixtures::*;
    use crate::{EntityId, Filter, GenericRepository, MemoryStore, MutationKind, StoreError};

    fn repo() -> (Arc<MemoryStore>, GenericRepository<Contact, MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), GenericRepository::new(store, "contacts"))
    }

    async fn seeded() -> GenericRepository<Contact, MemoryStore> {
        let (_, repo) = repo();
        for (i, segment) in ["vip", "vip", "lead", "vip", "lead"].iter().enumerate() {
            repo.insert(&contact(&format!("c-{i}"), &format!("name-{i}"), segment))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_insert_then_get_by_id() {
        let (_, repo) = repo();
        let c = contact("c-1", "Ada", "vip");
        repo.insert(&c).await.unwrap();

        let found = repo.get_by_id(&c.id).await.unwrap();
        assert_eq!(found, Some(c));
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_none() {
        let (_, repo) = repo();
        let found = repo.get_by_id(&EntityId::from("nope")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_insert_without_reported_id_fails() {
        let (store, repo) = repo();
        store.set_acknowledge_inserts(false);

        let err = repo.insert(&contact("c-1", "Ada", "vip")).await.unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::InsertFailed));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_an_error() {
        let (_, repo) = repo();
        repo.insert(&contact("c-1", "Ada", "vip")).await.unwrap();
        let err = repo.insert(&contact("c-1", "Bob", "vip")).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_select_pages_and_total() {
        let repo = seeded().await;

        let (total, page) = repo.select(2, 0, &[]).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (total, page) = repo.select(2, 4, &[]).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id.as_str(), "c-4");
    }

    #[tokio::test]
    async fn test_select_filters_are_anded() {
        let repo = seeded().await;

        let (total, page) = repo
            .select(10, 0, &[Filter::eq("segment", "vip")])
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(page.iter().all(|c| c.segment == "vip"));

        let (total, page) = repo
            .select(
                10,
                0,
                &[Filter::eq("segment", "vip"), Filter::eq("name", "name-3")],
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id.as_str(), "c-3");
    }

    #[tokio::test]
    async fn test_select_limit_zero_counts_only() {
        let repo = seeded().await;
        let (total, page) = repo.select(0, 0, &[]).await.unwrap();
        assert_eq!(total, 5);
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_select_no_match_is_empty_not_error() {
        let repo = seeded().await;
        let (total, page) = repo
            .select(10, 0, &[Filter::eq("segment", "churned")])
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_count_filter() {
        let repo = seeded().await;
        assert_eq!(
            repo.count_filter(&Filter::eq("segment", "lead")).await.unwrap(),
            2
        );
    }
}

#[cfg(test)]
mod mutation_tests {
    use std::sync::Arc;

    use super::fixtures::*;
    use crate::{
        EntityId, Filter, GenericRepository, MemoryStore, MutationKind, StoreError, Timestamps,
    };

    fn repo() -> (Arc<MemoryStore>, GenericRepository<Contact, MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), GenericRepository::new(store, "contacts"))
    }

    #[tokio::test]
    async fn test_bulk_insert_stamps_timestamps() {
        let (store, repo) = repo();
        let old = chrono::DateTime::from_timestamp(0, 0).unwrap();
        let mut batch = vec![contact("a", "A", "vip"), contact("b", "B", "vip")];
        for c in batch.iter_mut() {
            c.created_at = old;
            c.updated_at = old;
        }

        repo.bulk_insert(&mut batch).await.unwrap();

        assert!(batch.iter().all(|c| c.created_at > old));
        assert!(batch.iter().all(|c| c.created_at == c.updated_at));
        assert_eq!(store.documents("contacts").len(), 2);
        assert_eq!(repo.get_by_id(&batch[0].id).await.unwrap(), Some(batch[0].clone()));
    }

    #[tokio::test]
    async fn test_bulk_insert_short_acknowledgement_is_not_an_error() {
        let (store, repo) = repo();
        store.set_acknowledge_inserts(false);
        let mut batch = vec![contact("a", "A", "vip"), contact("b", "B", "vip")];

        repo.bulk_insert(&mut batch).await.unwrap();

        assert_eq!(store.documents("contacts").len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batches_never_reach_the_store() {
        let (store, repo) = repo();
        let mut empty: Vec<Contact> = Vec::new();

        assert!(matches!(repo.bulk_insert(&mut empty).await, Err(StoreError::EmptyBatch(_))));
        assert!(matches!(repo.bulk_write_update(&mut empty).await, Err(StoreError::EmptyBatch(_))));
        assert!(matches!(
            repo.bulk_update_by_filter(&[Filter::eq("segment", "vip")], &mut empty).await,
            Err(StoreError::EmptyBatch(_))
        ));
        assert!(matches!(repo.bulk_update_one_by_id(&mut empty).await, Err(StoreError::EmptyBatch(_))));
        assert!(matches!(repo.bulk_write_delete(&empty).await, Err(StoreError::EmptyBatch(_))));
        assert!(matches!(repo.bulk_delete_one_by_id(&empty).await, Err(StoreError::EmptyBatch(_))));
        assert!(matches!(repo.bulk_delete_many_by_filter(&[]).await, Err(StoreError::EmptyBatch(_))));

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_by_id_replaces_and_stamps() {
        let (_, repo) = repo();
        let mut c = contact("c-1", "Ada", "vip");
        c.updated_at = chrono::DateTime::from_timestamp(0, 0).unwrap();
        c.created_at = c.updated_at;
        repo.insert(&c).await.unwrap();

        c.name = "Ada Lovelace".to_string();
        repo.update_by_id(&mut c).await.unwrap();

        let stored = repo.get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada Lovelace");
        assert!(stored.updated_at() > stored.created_at());
        assert_eq!(stored, c);
    }

    #[tokio::test]
    async fn test_update_by_id_missing_is_mutation_failure() {
        let (_, repo) = repo();
        let err = repo
            .update_by_id(&mut contact("ghost", "G", "vip"))
            .await
            .unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::UpdateFailed));
    }

    #[tokio::test]
    async fn test_bulk_write_update_targets_each_entity() {
        let (_, repo) = repo();
        let mut batch = vec![contact("a", "A", "lead"), contact("b", "B", "lead")];
        repo.bulk_insert(&mut batch).await.unwrap();

        batch[0].segment = "vip".to_string();
        batch[1].name = "Bee".to_string();
        repo.bulk_write_update(&mut batch).await.unwrap();

        let a = repo.get_by_id(&EntityId::from("a")).await.unwrap().unwrap();
        let b = repo.get_by_id(&EntityId::from("b")).await.unwrap().unwrap();
        assert_eq!((a.name.as_str(), a.segment.as_str()), ("A", "vip"));
        assert_eq!((b.name.as_str(), b.segment.as_str()), ("Bee", "lead"));
    }

    #[tokio::test]
    async fn test_bulk_write_update_nothing_matched() {
        let (_, repo) = repo();
        let mut batch = vec![contact("x", "X", "vip")];
        let err = repo.bulk_write_update(&mut batch).await.unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::BulkUpdateFailed));
    }

    #[tokio::test]
    async fn test_bulk_update_by_filter_applies_in_order() {
        let (_, repo) = repo();
        let mut seed = vec![
            contact("a", "A", "vip"),
            contact("b", "B", "vip"),
            contact("c", "C", "lead"),
        ];
        repo.bulk_insert(&mut seed).await.unwrap();

        let mut updates = vec![contact("u1", "First", "vip"), contact("u2", "Second", "vip")];
        repo.bulk_update_by_filter(&[Filter::eq("segment", "vip")], &mut updates)
            .await
            .unwrap();

        let (_, vips) = repo.select(10, 0, &[Filter::eq("segment", "vip")]).await.unwrap();
        assert_eq!(vips.len(), 2);
        assert!(vips.iter().all(|c| c.name == "Second"));
        // ids are never overwritten
        assert!(repo.get_by_id(&EntityId::from("a")).await.unwrap().is_some());

        let lead = repo.get_by_id(&EntityId::from("c")).await.unwrap().unwrap();
        assert_eq!(lead.name, "C");
    }

    #[tokio::test]
    async fn test_bulk_update_one_by_id_scopes_each_entity() {
        let (_, repo) = repo();
        let mut batch = vec![contact("a", "A", "lead"), contact("b", "B", "lead")];
        repo.bulk_insert(&mut batch).await.unwrap();

        batch[0].name = "Alpha".to_string();
        batch[1].name = "Beta".to_string();
        repo.bulk_update_one_by_id(&mut batch).await.unwrap();

        let a = repo.get_by_id(&EntityId::from("a")).await.unwrap().unwrap();
        let b = repo.get_by_id(&EntityId::from("b")).await.unwrap().unwrap();
        assert_eq!(a.name, "Alpha");
        assert_eq!(b.name, "Beta");
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let (_, repo) = repo();
        let c = contact("c-1", "Ada", "vip");
        repo.insert(&c).await.unwrap();

        repo.delete_by_id(&c.id).await.unwrap();
        assert!(repo.get_by_id(&c.id).await.unwrap().is_none());

        let err = repo.delete_by_id(&c.id).await.unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::DeleteFailed));
    }

    #[tokio::test]
    async fn test_bulk_write_delete() {
        let (store, repo) = repo();
        let mut batch = vec![contact("a", "A", "vip"), contact("b", "B", "vip")];
        repo.bulk_insert(&mut batch).await.unwrap();
        let ghost = contact("ghost", "G", "vip");

        repo.bulk_write_delete(&[batch[0].clone(), ghost.clone()])
            .await
            .unwrap();
        assert_eq!(store.documents("contacts").len(), 1);

        let err = repo.bulk_write_delete(&[ghost]).await.unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::BulkDeleteFailed));
    }

    #[tokio::test]
    async fn test_bulk_delete_many_by_filter() {
        let (store, repo) = repo();
        let mut batch = vec![
            contact("a", "A", "vip"),
            contact("b", "B", "lead"),
            contact("c", "C", "vip"),
        ];
        repo.bulk_insert(&mut batch).await.unwrap();

        repo.bulk_delete_many_by_filter(&[Filter::eq("segment", "vip")])
            .await
            .unwrap();
        assert_eq!(store.documents("contacts").len(), 1);

        let err = repo
            .bulk_delete_many_by_filter(&[Filter::eq("segment", "vip")])
            .await
            .unwrap_err();
        assert_eq!(err.mutation_kind(), Some(MutationKind::DeleteFailed));
    }

    #[tokio::test]
    async fn test_bulk_delete_one_by_id() {
        let (store, repo) = repo();
        let mut batch = vec![contact("a", "A", "vip"), contact("b", "B", "vip")];
        repo.bulk_insert(&mut batch).await.unwrap();

        repo.bulk_delete_one_by_id(&batch).await.unwrap();
        assert!(store.documents("contacts").is_empty());
    }
}

#[cfg(test)]
mod transaction_tests {
    use std::sync::Arc;

    use super::fixtures::*;
    use crate::{GenericRepository, MemoryStore, StoreError};

    fn repo() -> (Arc<MemoryStore>, GenericRepository<Contact, MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), GenericRepository::new(store, "contacts"))
    }

    #[tokio::test]
    async fn test_abort_leaves_collection_unchanged() {
        let (store, repo) = repo();
        repo.insert(&contact("keep", "K", "vip")).await.unwrap();
        let before = store.documents("contacts");

        let session = repo.start_session().await.unwrap();
        repo.start_transaction(&session).await.unwrap();

        let scoped = repo.in_session(&session);
        scoped.insert(&contact("temp", "T", "vip")).await.unwrap();
        scoped.delete_by_id(&"keep".into()).await.unwrap();

        repo.abort_transaction(&session).await.unwrap();
        repo.end_session(session).await;

        assert_eq!(store.documents("contacts"), before);
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let (store, repo) = repo();
        let session = repo.start_session().await.unwrap();
        repo.start_transaction(&session).await.unwrap();
        repo.in_session(&session)
            .insert(&contact("a", "A", "vip"))
            .await
            .unwrap();
        repo.commit_transaction(&session).await.unwrap();
        repo.end_session(session).await;

        assert_eq!(store.documents("contacts").len(), 1);
    }

    #[tokio::test]
    async fn test_end_session_rolls_back_open_transaction() {
        let (store, repo) = repo();
        let session = repo.start_session().await.unwrap();
        repo.start_transaction(&session).await.unwrap();
        repo.in_session(&session)
            .insert(&contact("a", "A", "vip"))
            .await
            .unwrap();

        repo.end_session(session).await;
        assert!(store.documents("contacts").is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let (_, repo) = repo();
        let session = repo.start_session().await.unwrap();
        let err = repo.commit_transaction(&session).await.unwrap_err();
        assert!(matches!(err, StoreError::Transaction(_)));
        repo.end_session(session).await;
    }

    #[tokio::test]
    async fn test_with_transaction_commits_on_ok() {
        let (store, repo) = repo();
        let value = repo
            .with_transaction(|tx| async move {
                tx.insert(&contact("a", "A", "vip")).await?;
                tx.insert(&contact("b", "B", "vip")).await?;
                Ok::<_, StoreError>(2)
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(store.documents("contacts").len(), 2);
    }

    #[tokio::test]
    async fn test_with_transaction_aborts_on_err() {
        let (store, repo) = repo();
        repo.insert(&contact("a", "A", "vip")).await.unwrap();

        let result = repo
            .with_transaction(|tx| async move {
                tx.insert(&contact("b", "B", "vip")).await?;
                // duplicate id fails the unit of work
                tx.insert(&contact("a", "A2", "vip")).await?;
                Ok::<_, StoreError>(())
            })
            .await;

        assert!(result.is_err());
        let ids: Vec<_> = store
            .documents("contacts")
            .iter()
            .map(|d| d.get_str("_id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }
}
