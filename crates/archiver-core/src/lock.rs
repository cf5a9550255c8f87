//! # Distributed Lock
//!
//! The lease/session abstraction the executor relies on for mutual exclusion
//! across `repo/<id>` and `root/<hex>` keys. An in-process implementation is
//! provided as the reference backend for tests and single-host deployments;
//! a distributed backend (etcd, Consul, ...) would implement the same two
//! traits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::LockError;

//================================================================================================
// Traits
//================================================================================================

/// A session capable of acquiring leased locks. Implementations bound
/// acquisition by a lease timeout; a lock held past its lease is
/// automatically released so a crashed holder cannot wedge a key forever.
#[async_trait]
pub trait LockSession: Send + Sync {
    /// Acquire an exclusive lease on `key`, waiting up to `timeout`.
    async fn lock(&self, key: &str, timeout: Duration) -> Result<Box<dyn Lease>, LockError>;
}

/// A held lease. Dropping it without calling [`Lease::unlock`] still
/// releases the key (best-effort, synchronously) so a panic mid-job cannot
/// leak it; `unlock` is the explicit, awaited release path.
#[async_trait]
pub trait Lease: Send {
    /// Release the lease. Idempotent.
    async fn unlock(self: Box<Self>);
}

//================================================================================================
// In-process implementation
//================================================================================================

/// An in-process [`LockSession`] backed by a map of per-key semaphores.
/// Mutual exclusion is enforced by a single-permit [`Semaphore`] per key;
/// acquisition honours the caller's timeout via `tokio::time::timeout`.
#[derive(Clone, Default)]
pub struct LocalLockSession {
    keys: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

struct LocalLease {
    permit: Option<OwnedSemaphorePermit>,
}

impl LocalLockSession {
    /// Construct a fresh, empty session.
    pub fn new() -> Self {
        Self::default()
    }

    async fn semaphore_for(&self, key: &str) -> Arc<Semaphore> {
        let mut keys = self.keys.lock().await;
        keys.entry(key.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }
}

#[async_trait]
impl LockSession for LocalLockSession {
    async fn lock(&self, key: &str, timeout: Duration) -> Result<Box<dyn Lease>, LockError> {
        let semaphore = self.semaphore_for(key).await;
        let permit = tokio::time::timeout(timeout, semaphore.acquire_owned())
            .await
            .map_err(|_| LockError::Timeout(key.to_owned()))?
            .map_err(|_| LockError::Backend("semaphore closed".to_owned()))?;
        Ok(Box::new(LocalLease {
            permit: Some(permit),
        }))
    }
}

#[async_trait]
impl Lease for LocalLease {
    async fn unlock(mut self: Box<Self>) {
        // Dropping the permit releases the semaphore; an explicit drop here
        // makes the release point visible at the call site instead of
        // whenever the Lease happens to go out of scope.
        self.permit.take();
    }
}

/// Acquire a repository lock followed by a set of archive locks, in
/// ascending hex order, so that two jobs needing overlapping archive locks
/// can never deadlock against each other.
pub async fn lock_roots_in_order<'a>(
    session: &'a dyn LockSession,
    roots: &[crate::model::RootHash],
    timeout: Duration,
) -> Result<Vec<Box<dyn Lease>>, LockError> {
    let mut ordered: Vec<_> = roots.to_vec();
    ordered.sort();

    let mut leases = Vec::with_capacity(ordered.len());
    for root in ordered {
        let key = format!("root/{root}");
        leases.push(session.lock(&key, timeout).await?);
    }
    Ok(leases)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_lock_on_same_key_times_out() {
        let session = LocalLockSession::new();
        let lease = session.lock("repo/a", Duration::from_secs(1)).await.unwrap();
        let result = session.lock("repo/a", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LockError::Timeout(_))));
        lease.unlock().await;
    }

    #[tokio::test]
    async fn lock_is_available_again_after_unlock() {
        let session = LocalLockSession::new();
        let lease = session.lock("repo/b", Duration::from_secs(1)).await.unwrap();
        lease.unlock().await;
        let second = session.lock("repo/b", Duration::from_secs(1)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let session = LocalLockSession::new();
        let a = session.lock("repo/a", Duration::from_millis(50)).await;
        let b = session.lock("repo/b", Duration::from_millis(50)).await;
        assert!(a.is_ok());
        assert!(b.is_ok());
    }
}
