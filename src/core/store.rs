//! Persistence abstraction for owner-scoped records.
//!
//! The engine reads and writes through [`EntityStore`] only; it never
//! touches storage directly.

use super::error::Result;
use super::models::{BudgetLimit, Goal, MonetaryEntry, NotificationEvent, OwnerId};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A persisted record that belongs to a single owner.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Name used for error messages and storage partitions.
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn owner(&self) -> &OwnerId;
}

#[async_trait]
pub trait EntityStore<T: Record>: Send + Sync {
    async fn create(&self, record: T) -> Result<T>;
    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<T>>;
    async fn find_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>>;
    /// Replaces the record; `None` when it does not exist for this owner or
    /// `record` carries a different id or owner.
    async fn update_by_id_and_owner(
        &self,
        id: Uuid,
        owner: &OwnerId,
        record: T,
    ) -> Result<Option<T>>;
    /// Removes and returns the record; `None` when it does not exist for this owner.
    async fn delete_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>>;
}

macro_rules! impl_record {
    ($ty:ty, $kind:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn owner(&self) -> &OwnerId {
                &self.owner
            }
        }
    };
}

impl_record!(MonetaryEntry, "transaction");
impl_record!(BudgetLimit, "budget");
impl_record!(Goal, "goal");
impl_record!(NotificationEvent, "notification");
