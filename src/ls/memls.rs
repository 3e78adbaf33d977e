//! Simple in-memory locksystem.
//!
//! The lock table lives behind one mutex. Expired locks are purged lazily,
//! whenever the table is touched. Nothing survives a restart.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::davpath::DavPath;
use crate::ls::*;

/// Ephemeral in-memory LockSystem.
#[derive(Debug, Default)]
pub struct MemLs {
    // keyed by DavPath::lock_key().
    locks: Mutex<HashMap<String, DavLock>>,
}

impl MemLs {
    /// Create a new "memls" locksystem.
    pub fn new() -> Arc<MemLs> {
        Arc::new(MemLs::default())
    }
}

fn purge_expired(locks: &mut HashMap<String, DavLock>) {
    let now = SystemTime::now();
    locks.retain(|_, lock| {
        let keep = !lock.is_expired(now);
        if !keep {
            debug!("lock {} on {} expired", lock.token, lock.path);
        }
        keep
    });
}

// is `key` the path itself or (if deep) below it.
fn covers(path: &DavPath, deep: bool, lock: &DavLock) -> bool {
    lock.path.same_resource(path) || (deep && lock.path.is_descendant_of(path))
}

impl DavLockSystem for MemLs {
    fn lock(&self, path: &DavPath, owner: Option<&str>, timeout: Duration) -> Result<DavLock, DavLock> {
        let mut locks = self.locks.lock();
        purge_expired(&mut locks);

        let key = path.lock_key();
        if let Some(existing) = locks.get(&key) {
            debug!("lock on {path} refused, held by {}", existing.token);
            return Err(existing.clone());
        }
        let lock = DavLock {
            token: format!("urn:uuid:{}", Uuid::new_v4()),
            path: path.clone(),
            owner: owner.map(str::to_string),
            timeout_at: SystemTime::now() + timeout,
            timeout,
        };
        debug!("lock {} created on {path}", lock.token);
        locks.insert(key, lock.clone());
        Ok(lock)
    }

    fn unlock(&self, path: &DavPath, token: &str) -> Result<(), ()> {
        let mut locks = self.locks.lock();
        purge_expired(&mut locks);

        let key = path.lock_key();
        match locks.get(&key) {
            Some(lock) if lock.token == token => {
                debug!("lock {token} on {path} released");
                locks.remove(&key);
                Ok(())
            }
            _ => Err(()),
        }
    }

    fn refresh(&self, path: &DavPath, token: &str, timeout: Duration) -> Result<DavLock, ()> {
        let mut locks = self.locks.lock();
        purge_expired(&mut locks);

        match locks.get_mut(&path.lock_key()) {
            Some(lock) if lock.token == token => {
                lock.timeout = timeout;
                lock.timeout_at = SystemTime::now() + timeout;
                Ok(lock.clone())
            }
            _ => Err(()),
        }
    }

    fn check(&self, path: &DavPath, deep: bool, submitted_tokens: &[String]) -> Result<(), DavLock> {
        let mut locks = self.locks.lock();
        purge_expired(&mut locks);

        for lock in locks.values() {
            if covers(path, deep, lock) && !submitted_tokens.iter().any(|t| *t == lock.token) {
                return Err(lock.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, path: &DavPath) {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| !covers(path, true, lock));
    }
}
