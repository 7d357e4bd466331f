use crate::core::error::Result;
use crate::core::models::OwnerId;
use crate::core::store::{EntityStore, Record};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Opens (or creates) the keyspace holding every record partition.
pub fn open_keyspace(path: &Path) -> Result<Keyspace> {
    std::fs::create_dir_all(path)
        .map_err(|e| crate::core::error::LedgerError::Store(e.to_string()))?;
    Ok(fjall::Config::new(path).open()?)
}

/// Entity store persisted in a fjall partition named after the record kind.
///
/// Keys are `owner/id`, values the JSON encoded record.
pub struct DiskStore<T: Record> {
    keyspace: Keyspace,
    partition: PartitionHandle,
    _marker: PhantomData<T>,
}

impl<T: Record> DiskStore<T> {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let partition =
            keyspace.open_partition(T::KIND, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            partition,
            _marker: PhantomData,
        })
    }

    fn key(owner: &OwnerId, id: Uuid) -> Vec<u8> {
        format!("{owner}/{id}").into_bytes()
    }

    fn write(&self, record: &T) -> Result<()> {
        let key = Self::key(record.owner(), record.id());
        self.partition.insert(key, serde_json::to_vec(record)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl<T: Record> EntityStore<T> for DiskStore<T> {
    async fn create(&self, record: T) -> Result<T> {
        debug!(kind = T::KIND, id = %record.id(), "Writing record to disk");
        self.write(&record)?;
        Ok(record)
    }

    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in self.partition.prefix(format!("{owner}/")) {
            let (_, value) = item?;
            let record: T = serde_json::from_slice(&value)?;
            // Owners containing '/' could share a prefix with another owner.
            if record.owner() == owner {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn find_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>> {
        match self.partition.get(Self::key(owner, id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn update_by_id_and_owner(
        &self,
        id: Uuid,
        owner: &OwnerId,
        record: T,
    ) -> Result<Option<T>> {
        if record.id() != id || record.owner() != owner {
            debug!(kind = T::KIND, %id, "Refusing update that changes id or owner");
            return Ok(None);
        }
        if !self.partition.contains_key(Self::key(owner, id))? {
            return Ok(None);
        }
        self.write(&record)?;
        Ok(Some(record))
    }

    async fn delete_by_id_and_owner(&self, id: Uuid, owner: &OwnerId) -> Result<Option<T>> {
        let Some(existing) = self.find_by_id_and_owner(id, owner).await? else {
            return Ok(None);
        };
        self.partition.remove(Self::key(owner, id))?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(kind = T::KIND, %id, "Removed record from disk");
        Ok(Some(existing))
    }
}
