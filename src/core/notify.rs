//! Single entry point for creating user notifications.
//!
//! Producers describe what happened with a kind and a fingerprint; the
//! dispatcher decides whether that event is new and persists it. Delivery
//! (email, push) is left to whoever watches the notification store.

use super::error::{LedgerError, Result};
use super::models::{NotificationEvent, NotificationKind, OwnerId};
use super::store::EntityStore;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of [`NotificationDispatcher::notify`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Created(NotificationEvent),
    /// An equivalent notification is still unread or inside the cooldown.
    Suppressed { dedup_key: String },
}

impl Dispatch {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Dispatch::Suppressed { .. })
    }
}

pub fn goal_fingerprint(goal_id: Uuid) -> String {
    goal_id.to_string()
}

/// `period` names the budget period breached, e.g. `2024-02` or `all`.
pub fn breach_fingerprint(category: &str, period: &str) -> String {
    format!("{category}:{period}")
}

pub fn recurring_fingerprint(template_id: Uuid, occurrence: NaiveDate) -> String {
    format!("{template_id}:{occurrence}")
}

pub fn anomaly_fingerprint(entry_id: Uuid) -> String {
    format!("anomaly:{entry_id}")
}

/// Stable key identifying "the same event" for one owner.
pub fn dedup_key(owner: &OwnerId, kind: NotificationKind, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [owner.as_str(), kind.as_str(), fingerprint] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

type OwnerLocks = Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>;

pub struct NotificationDispatcher {
    store: Arc<dyn EntityStore<NotificationEvent>>,
    cooldown: TimeDelta,
    // Check-then-create runs under the owner's lock so concurrent duplicates collapse.
    owner_locks: OwnerLocks,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn EntityStore<NotificationEvent>>) -> Self {
        Self {
            store,
            cooldown: TimeDelta::hours(24),
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cooldown(mut self, cooldown: TimeDelta) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub async fn notify(
        &self,
        owner: &OwnerId,
        kind: NotificationKind,
        message: impl Into<String>,
        fingerprint: &str,
    ) -> Result<Dispatch> {
        self.notify_at(owner, kind, message, fingerprint, Utc::now())
            .await
    }

    /// [`notify`](Self::notify) with an explicit clock.
    pub async fn notify_at(
        &self,
        owner: &OwnerId,
        kind: NotificationKind,
        message: impl Into<String>,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Dispatch> {
        let dedup_key = dedup_key(owner, kind, fingerprint);
        let lock = self.owner_lock(owner).await;
        let _guard = lock.lock().await;

        let existing = self.store.find_by_owner(owner).await?;
        let blocking = existing.iter().find(|n| {
            n.dedup_key == dedup_key && (!n.read || now - n.created_at < self.cooldown)
        });
        if let Some(previous) = blocking {
            debug!(
                %owner,
                %kind,
                fingerprint,
                previous = %previous.id,
                "Suppressed duplicate notification"
            );
            return Ok(Dispatch::Suppressed { dedup_key });
        }

        let event = NotificationEvent {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            kind,
            message: message.into(),
            read: false,
            created_at: now,
            dedup_key,
        };
        let event = self.store.create(event).await?;
        info!(%owner, %kind, id = %event.id, "Notification created");
        Ok(Dispatch::Created(event))
    }

    async fn owner_lock(&self, owner: &OwnerId) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock().await;
        Arc::clone(locks.entry(owner.clone()).or_default())
    }

    /// Owner's notifications, newest first.
    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<NotificationEvent>> {
        let mut events = self.store.find_by_owner(owner).await?;
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    pub async fn mark_read(&self, owner: &OwnerId, id: Uuid) -> Result<NotificationEvent> {
        let mut event = self
            .store
            .find_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("notification", id))?;
        event.read = true;
        self.store
            .update_by_id_and_owner(id, owner, event)
            .await?
            .ok_or_else(|| LedgerError::not_found("notification", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn dispatcher() -> (NotificationDispatcher, Arc<MemoryStore<NotificationEvent>>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&store) as Arc<dyn EntityStore<NotificationEvent>>
        );
        (dispatcher, store)
    }

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hour)
    }

    #[test]
    fn test_dedup_key_is_stable_and_distinct() {
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");
        let key = dedup_key(&alice, NotificationKind::Spending, "Food:2024-03");

        assert_eq!(key.len(), 64);
        assert_eq!(key, dedup_key(&alice, NotificationKind::Spending, "Food:2024-03"));
        assert_ne!(key, dedup_key(&alice, NotificationKind::Custom, "Food:2024-03"));
        assert_ne!(key, dedup_key(&bob, NotificationKind::Spending, "Food:2024-03"));
        assert_ne!(key, dedup_key(&alice, NotificationKind::Spending, "Food:2024-02"));
        // Separator keeps field boundaries unambiguous.
        assert_ne!(
            dedup_key(&OwnerId::new("a"), NotificationKind::Goal, "bc"),
            dedup_key(&OwnerId::new("ab"), NotificationKind::Goal, "c")
        );
    }

    #[tokio::test]
    async fn test_duplicate_within_cooldown_is_suppressed() {
        let (dispatcher, store) = dispatcher();
        let alice = OwnerId::new("alice");

        let first = dispatcher
            .notify_at(&alice, NotificationKind::Spending, "Over budget", "Food:2024-03", at(0))
            .await
            .unwrap();
        let second = dispatcher
            .notify_at(&alice, NotificationKind::Spending, "Over budget", "Food:2024-03", at(2))
            .await
            .unwrap();

        let Dispatch::Created(event) = first else {
            panic!("expected a new notification");
        };
        assert!(!event.read);
        assert_eq!(second, Dispatch::Suppressed { dedup_key: event.dedup_key.clone() });
        assert_eq!(store.find_by_owner(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unread_duplicate_blocks_past_cooldown() {
        let (dispatcher, _) = dispatcher();
        let alice = OwnerId::new("alice");

        dispatcher
            .notify_at(&alice, NotificationKind::Goal, "New goal", "g1", at(0))
            .await
            .unwrap();
        let later = dispatcher
            .notify_at(&alice, NotificationKind::Goal, "New goal", "g1", at(48))
            .await
            .unwrap();
        assert!(later.is_suppressed());
    }

    #[tokio::test]
    async fn test_read_duplicate_allowed_after_cooldown() {
        let (dispatcher, store) = dispatcher();
        let alice = OwnerId::new("alice");

        let Dispatch::Created(event) = dispatcher
            .notify_at(&alice, NotificationKind::Spending, "Over budget", "Food", at(0))
            .await
            .unwrap()
        else {
            panic!("expected a new notification");
        };
        dispatcher.mark_read(&alice, event.id).await.unwrap();

        let early = dispatcher
            .notify_at(&alice, NotificationKind::Spending, "Over budget", "Food", at(23))
            .await
            .unwrap();
        assert!(early.is_suppressed());

        let after = dispatcher
            .notify_at(&alice, NotificationKind::Spending, "Over budget", "Food", at(24))
            .await
            .unwrap();
        assert!(!after.is_suppressed());
        assert_eq!(store.find_by_owner(&alice).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_different_fingerprints_and_owners_are_independent() {
        let (dispatcher, _) = dispatcher();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        for (owner, fingerprint) in [(&alice, "a"), (&alice, "b"), (&bob, "a")] {
            let outcome = dispatcher
                .notify_at(owner, NotificationKind::Custom, "hello", fingerprint, at(0))
                .await
                .unwrap();
            assert!(!outcome.is_suppressed());
        }
        assert_eq!(dispatcher.list(&alice).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_persist_once() {
        let (dispatcher, store) = dispatcher();
        let alice = OwnerId::new("alice");

        let kind = NotificationKind::Recurring;
        let (a, b) = tokio::join!(
            dispatcher.notify_at(&alice, kind, "Posted", "t1:2024-03-01", at(0)),
            dispatcher.notify_at(&alice, kind, "Posted", "t1:2024-03-01", at(0)),
        );

        assert_eq!(
            [a.unwrap(), b.unwrap()].iter().filter(|d| d.is_suppressed()).count(),
            1
        );
        assert_eq!(store.find_by_owner(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_owners_do_not_wait_on_each_other() {
        let (dispatcher, _) = dispatcher();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        let alice_lock = dispatcher.owner_lock(&alice).await;
        let _held = alice_lock.lock().await;

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            dispatcher.notify_at(&bob, NotificationKind::Custom, "hello", "x", at(0)),
        )
        .await
        .expect("bob should not wait for alice")
        .unwrap();
        assert!(!outcome.is_suppressed());

        let blocked = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            dispatcher.notify_at(&alice, NotificationKind::Custom, "hello", "x", at(0)),
        )
        .await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_mark_read_checks_owner() {
        let (dispatcher, _) = dispatcher();
        let alice = OwnerId::new("alice");

        dispatcher
            .notify_at(&alice, NotificationKind::Custom, "older", "1", at(0))
            .await
            .unwrap();
        dispatcher
            .notify_at(&alice, NotificationKind::Custom, "newer", "2", at(5))
            .await
            .unwrap();

        let events = dispatcher.list(&alice).await.unwrap();
        assert_eq!(events[0].message, "newer");
        assert_eq!(events[1].message, "older");

        let err = dispatcher
            .mark_read(&OwnerId::new("mallory"), events[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { kind: "notification", .. }));
    }

    struct FailingStore;

    #[async_trait]
    impl EntityStore<NotificationEvent> for FailingStore {
        async fn create(&self, _: NotificationEvent) -> Result<NotificationEvent> {
            Err(LedgerError::Store("disk full".into()))
        }
        async fn find_by_owner(&self, _: &OwnerId) -> Result<Vec<NotificationEvent>> {
            Ok(Vec::new())
        }
        async fn find_by_id_and_owner(
            &self,
            _: Uuid,
            _: &OwnerId,
        ) -> Result<Option<NotificationEvent>> {
            Ok(None)
        }
        async fn update_by_id_and_owner(
            &self,
            _: Uuid,
            _: &OwnerId,
            _: NotificationEvent,
        ) -> Result<Option<NotificationEvent>> {
            Ok(None)
        }
        async fn delete_by_id_and_owner(
            &self,
            _: Uuid,
            _: &OwnerId,
        ) -> Result<Option<NotificationEvent>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let dispatcher = NotificationDispatcher::new(Arc::new(FailingStore));
        let err = dispatcher
            .notify(&OwnerId::new("alice"), NotificationKind::Custom, "hi", "x")
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Store("disk full".into()));
    }
}
