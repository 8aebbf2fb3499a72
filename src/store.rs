use crate::user::{RecordError, UserId, UserRecord};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(&'static str, #[source] io::Error),
    #[error("no record for user {0}")]
    MissingRecord(UserId),
    #[error("corrupt record for user {0}")]
    CorruptRecord(UserId, #[source] RecordError),
    #[error("user lock poisoned")]
    LockPoisoned,
}

/// Abstraction on top of the record files.
///
/// One flat-text file per user lives under the data directory. Every
/// mutation runs load, mutate, save while holding that user's lock, so
/// two workers handling the same user serialize instead of overwriting
/// each other's writes.
pub struct Store {
    directory: PathBuf,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl Store {
    /// Opens a store rooted at `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| StoreError::Io("creating data dir", e))?;

        Ok(Self {
            directory,
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, user_id: UserId) -> PathBuf {
        self.directory.join(format!("{}.txt", user_id))
    }

    fn user_lock(&self, user_id: UserId) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self.user_locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(locks.entry(user_id).or_default().clone())
    }

    fn load(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let path = self.record_path(user_id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingRecord(user_id))
            }
            Err(e) => return Err(StoreError::Io("reading record", e)),
        };

        UserRecord::try_from(text.as_str()).map_err(|e| StoreError::CorruptRecord(user_id, e))
    }

    fn save(&self, user_id: UserId, record: &UserRecord) -> Result<(), StoreError> {
        fs::write(self.record_path(user_id), record.render())
            .map_err(|e| StoreError::Io("writing record", e))
    }

    /// Creates an empty record for the user if they have none yet.
    /// A user's file comes into existence on their first contact.
    ///
    /// This function is idempotent
    pub fn ensure(&self, user_id: UserId) -> Result<(), StoreError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        if !self.record_path(user_id).exists() {
            self.save(user_id, &UserRecord::new())?;
        }
        Ok(())
    }

    /// Returns a snapshot of the user's record
    pub fn read(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        self.load(user_id)
    }

    /// Loads the user's record, applies `mutate` and saves the result,
    /// all as one critical section under the user's lock.
    ///
    /// Whatever `mutate` returns is handed back, so callers can thread a
    /// rejection out of the closure without writing a torn record.
    pub fn with_user<T>(
        &self,
        user_id: UserId,
        mutate: impl FnOnce(&mut UserRecord) -> T,
    ) -> Result<T, StoreError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut record = self.load(user_id)?;
        let outcome = mutate(&mut record);
        self.save(user_id, &record)?;

        Ok(outcome)
    }

    /// Deletes the user's record file and returns its last contents, so
    /// the caller can unhook the user from the reminder registry.
    pub fn erase(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let record = self.load(user_id)?;
        fs::remove_file(self.record_path(user_id))
            .map_err(|e| StoreError::Io("removing record", e))?;

        Ok(record)
    }

    /// Reads every record in the store, in no particular order.
    ///
    /// Files that are not readable user records are skipped with a
    /// warning; one corrupt record must not keep the rest from loading.
    pub fn all_users(&self) -> Result<Vec<(UserId, UserRecord)>, StoreError> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| StoreError::Io("listing data dir", e))?;

        let mut users = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io("listing data dir", e))?;

            let file_name = entry.file_name();
            let user_id = match file_name
                .to_str()
                .and_then(|n| n.strip_suffix(".txt"))
                .and_then(|n| n.parse::<UserId>().ok())
            {
                Some(id) => id,
                None => {
                    warn!("skipping stray file in data dir: {:?}", file_name);
                    continue;
                }
            };

            match self.read(user_id) {
                Ok(record) => users.push((user_id, record)),
                Err(e) => {
                    warn!(user_id, "skipping unreadable record: {}", e);
                    continue;
                }
            }
        }

        Ok(users)
    }
}
