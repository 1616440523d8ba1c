//! Entity capability
//!
//! The repository never looks at an entity's payload. All it needs is the
//! identifier and the two timestamps, exposed through [`Identity`] and
//! [`Timestamps`]; everything else travels through serde.

use chrono::{DateTime, SubsecRound, Utc};
use kernel::id::EntityId;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Field name of the identifier in stored documents
pub const ID_FIELD: &str = "_id";

/// Current time truncated to the millisecond precision of stored dates
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub trait Identity {
    fn id(&self) -> &EntityId;
}

pub trait Timestamps {
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Set both timestamps to the same instant
    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.set_created_at(at);
        self.set_updated_at(at);
    }
}

/// Anything the generic repository can persist
pub trait Entity:
    Identity + Timestamps + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
}

impl<T> Entity for T where
    T: Identity + Timestamps + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
}

/// Implement [`Identity`] and [`Timestamps`] for a struct with `id`,
/// `created_at` and `updated_at` fields.
///
/// ```
/// use chrono::{DateTime, Utc};
/// use serde::{Deserialize, Serialize};
/// use store::{EntityId, Identity, impl_entity};
///
/// #[derive(Serialize, Deserialize)]
/// struct Contact {
///     #[serde(rename = "_id")]
///     id: EntityId,
///     #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
///     created_at: DateTime<Utc>,
///     #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
///     updated_at: DateTime<Utc>,
///     phone: String,
/// }
///
/// impl_entity!(Contact);
///
/// let now = store::now();
/// let c = Contact { id: EntityId::from("c-1"), created_at: now, updated_at: now, phone: "555".into() };
/// assert_eq!(c.id().as_str(), "c-1");
/// ```
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty) => {
        impl $crate::domain::entity::Identity for $ty {
            fn id(&self) -> &$crate::EntityId {
                &self.id
            }
        }

        impl $crate::domain::entity::Timestamps for $ty {
            fn created_at(&self) -> $crate::__chrono::DateTime<$crate::__chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> $crate::__chrono::DateTime<$crate::__chrono::Utc> {
                self.updated_at
            }

            fn set_created_at(&mut self, at: $crate::__chrono::DateTime<$crate::__chrono::Utc>) {
                self.created_at = at;
            }

            fn set_updated_at(&mut self, at: $crate::__chrono::DateTime<$crate::__chrono::Utc>) {
                self.updated_at = at;
            }
        }
    };
}
