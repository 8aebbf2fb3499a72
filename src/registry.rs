use crate::store::{Store, StoreError};
use crate::user::UserId;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Who wants a reminder at which server-local "HH:MM" bucket.
///
/// Workers add and remove users while the scheduler reads, so the map
/// lives behind a mutex and is only reachable through these methods. The
/// contents always mirror the union of every persisted record's reminder
/// times; rebuild from the store on startup before taking traffic.
#[derive(Default)]
pub struct ReminderRegistry {
    buckets: Mutex<HashMap<String, HashSet<UserId>>>,
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from every record currently in the store
    pub fn rebuild(store: &Store) -> Result<Self, StoreError> {
        let registry = Self::new();
        for (user_id, record) in store.all_users()? {
            registry.register(user_id, record.get_reminder_times());
        }
        Ok(registry)
    }

    /// Subscribes a user under each of the given buckets
    pub fn register(&self, user_id: UserId, times: &[String]) {
        let mut buckets = self.lock();
        for time in times {
            buckets.entry(time.clone()).or_default().insert(user_id);
        }
    }

    /// Removes a user from each of the given buckets, dropping buckets
    /// that end up empty
    pub fn unregister(&self, user_id: UserId, times: &[String]) {
        let mut buckets = self.lock();
        for time in times {
            if let Some(subscribers) = buckets.get_mut(time.as_str()) {
                subscribers.remove(&user_id);
                if subscribers.is_empty() {
                    buckets.remove(time.as_str());
                }
            }
        }
    }

    /// Returns a snapshot of the users subscribed under `bucket`.
    ///
    /// Users added or removed while a reminder sweep is running may or may
    /// not make this snapshot; delivery is best-effort by design.
    pub fn subscribers(&self, bucket: &str) -> Vec<UserId> {
        let buckets = self.lock();
        let mut ids: Vec<UserId> = buckets
            .get(bucket)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashSet<UserId>>> {
        // A panic while holding the lock leaves plain data behind, safe to
        // keep using.
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::ReminderRegistry;
    use crate::store::Store;

    #[test]
    fn test_register_and_lookup() {
        let registry = ReminderRegistry::new();
        registry.register(1, &[String::from("10:30"), String::from("19:00")]);
        registry.register(2, &[String::from("10:30")]);

        assert_eq!(registry.subscribers("10:30"), [1, 2]);
        assert_eq!(registry.subscribers("19:00"), [1]);
        assert!(registry.subscribers("08:00").is_empty());
    }

    #[test]
    fn test_unregister_clears_every_bucket() {
        let registry = ReminderRegistry::new();
        let times = [String::from("10:30"), String::from("19:00")];
        registry.register(1, &times);
        registry.register(2, &times[..1]);

        registry.unregister(1, &times);

        assert_eq!(registry.subscribers("10:30"), [2]);
        assert!(registry.subscribers("19:00").is_empty());
    }

    #[test]
    fn test_registering_twice_keeps_one_entry() {
        let registry = ReminderRegistry::new();
        registry.register(1, &[String::from("10:30")]);
        registry.register(1, &[String::from("10:30")]);

        assert_eq!(registry.subscribers("10:30"), [1]);
    }

    #[test]
    fn test_rebuild_replays_persisted_times() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.ensure(1).unwrap();
        store.ensure(2).unwrap();
        store
            .with_user(1, |r| r.extend_reminder_times(&[String::from("10:30")]))
            .unwrap();
        store
            .with_user(2, |r| {
                r.extend_reminder_times(&[String::from("10:30"), String::from("22:00")])
            })
            .unwrap();

        let registry = ReminderRegistry::rebuild(&store).unwrap();

        assert_eq!(registry.subscribers("10:30"), [1, 2]);
        assert_eq!(registry.subscribers("22:00"), [2]);
    }
}
