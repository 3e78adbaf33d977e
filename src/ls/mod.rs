//! Contains the structs and traits that define a `locksystem` backend,
//! and the policy that decides which clients get to use it.
//!
//! Only exclusive write locks of depth 0 exist: a lock covers exactly
//! one resource.
use std::fmt::Debug;
use std::time::{Duration, SystemTime};

use http::HeaderMap;

use crate::davpath::DavPath;

mod memls;

pub use memls::MemLs;

/// One active lock.
#[derive(Debug, Clone)]
pub struct DavLock {
    /// Opaque token, `urn:uuid:<uuid>`.
    pub token: String,
    /// Locked resource.
    pub path: DavPath,
    /// Client supplied owner, usually an href.
    pub owner: Option<String>,
    /// When the lock lapses.
    pub timeout_at: SystemTime,
    /// The granted timeout.
    pub timeout: Duration,
}

impl DavLock {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.timeout_at <= now
    }
}

/// The trait that defines a locksystem.
///
/// Implementations own the lock table and must serialize all access to it.
/// Expired locks are treated as absent.
pub trait DavLockSystem: Debug + Send + Sync {
    /// Lock a resource. Returns the conflicting lock if it is already locked.
    fn lock(&self, path: &DavPath, owner: Option<&str>, timeout: Duration) -> Result<DavLock, DavLock>;

    /// Unlock a resource. Fails unless `token` is the token of the current lock.
    fn unlock(&self, path: &DavPath, token: &str) -> Result<(), ()>;

    /// Refresh the timeout of an existing lock.
    fn refresh(&self, path: &DavPath, token: &str, timeout: Duration) -> Result<DavLock, ()>;

    /// Check if `path` (and, if `deep`, anything below it) may be modified by a
    /// request that submitted `submitted_tokens`. Returns the blocking lock if not.
    fn check(&self, path: &DavPath, deep: bool, submitted_tokens: &[String]) -> Result<(), DavLock>;

    /// Drop all locks on and below `path` (the resource is gone).
    fn delete(&self, path: &DavPath);
}

/// Decides whether a client may use LOCK/UNLOCK.
///
/// Locking is only advertised to (and accepted from) clients that need it,
/// clients that do not ask for it never see level-2 semantics.
pub trait LockPolicy: Send + Sync {
    fn supports_locking(&self, headers: &HeaderMap) -> bool;
}

impl<F> LockPolicy for F
where
    F: Fn(&HeaderMap) -> bool + Send + Sync,
{
    fn supports_locking(&self, headers: &HeaderMap) -> bool {
        self(headers)
    }
}

/// Desktop WebDAV integrations, recognized by their `User-Agent`:
/// macOS Finder (`WebDAVFS/`, `WebDAVLib/`) and the Windows mini-redirector.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopClients;

const DESKTOP_AGENTS: &[&str] = &["WebDAVFS/", "WebDAVLib/", "Microsoft-WebDAV-MiniRedir/"];

impl LockPolicy for DesktopClients {
    fn supports_locking(&self, headers: &HeaderMap) -> bool {
        headers
            .get(http::header::USER_AGENT)
            .and_then(|ua| ua.to_str().ok())
            .map(|ua| DESKTOP_AGENTS.iter().any(|p| ua.starts_with(p)))
            .unwrap_or(false)
    }
}

/// Every client may lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllClients;

impl LockPolicy for AllClients {
    fn supports_locking(&self, _headers: &HeaderMap) -> bool {
        true
    }
}
