//! Process-wide single-flight registry for category syncs

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{Error, Result};
use crate::models::Category;

type Key = (String, Category);

fn registry() -> MutexGuard<'static, HashSet<Key>> {
    static ACTIVE: OnceLock<Mutex<HashSet<Key>>> = OnceLock::new();
    ACTIVE
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Held while a sync of one `(user, category)` runs; released on drop.
#[derive(Debug)]
pub struct SyncGuard {
    key: Key,
}

impl SyncGuard {
    pub fn acquire(user: &str, category: Category) -> Result<Self> {
        let key = (user.to_string(), category);
        if !registry().insert(key.clone()) {
            return Err(Error::SyncInProgress(format!("{category} for user {user}")));
        }
        Ok(Self { key })
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        registry().remove(&self.key);
    }
}
