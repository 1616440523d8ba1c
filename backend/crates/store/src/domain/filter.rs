//! Equality filters
//!
//! A [`Filter`] is one `(key, value)` equality predicate. A list of filters
//! is ANDed; an empty list selects the whole collection.

use bson::{Bson, Document, doc};
use kernel::id::EntityId;

use super::entity::ID_FIELD;

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub key: String,
    pub value: Bson,
}

impl Filter {
    /// `key == value`; dotted keys address nested fields
    pub fn eq(key: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn by_id(id: &EntityId) -> Self {
        Self::eq(ID_FIELD, id.as_str())
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(self.key.clone(), self.value.clone());
        doc
    }

    /// AND the filters into one query document.
    ///
    /// Distinct keys produce a flat document. A repeated key cannot live in
    /// one document, so the predicates are wrapped in `$and` instead.
    pub fn all(filters: &[Filter]) -> Document {
        let mut doc = Document::new();
        for filter in filters {
            if doc.contains_key(&filter.key) {
                let clauses: Vec<Bson> = filters
                    .iter()
                    .map(|f| Bson::Document(f.to_document()))
                    .collect();
                return doc! { "$and": clauses };
            }
            doc.insert(filter.key.clone(), filter.value.clone());
        }
        doc
    }
}
