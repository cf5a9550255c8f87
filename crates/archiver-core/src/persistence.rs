//! # Persistence Interface
//!
//! The contract the job executor and state machine rely on for reading and
//! writing repository records. An external store (e.g. a SQL database)
//! implements this trait in production; [`InMemoryPersistence`] is the
//! lightweight fake used by this crate's own tests so the executor's
//! integration tests don't require a real database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{ForkStatus, Reference, Repository, RepositoryId, Status};

//================================================================================================
// Traits
//================================================================================================

/// The persistence operations the archiver core needs from an external
/// repository store.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Fetch a repository record by id.
    async fn get_by_id(&self, id: RepositoryId) -> Result<Repository, String>;

    /// Fetch every repository record sharing any of the given endpoints.
    async fn get_by_endpoints(&self, url: &str) -> Result<Vec<Repository>, String>;

    /// Create a repository record if one matching `endpoints` doesn't
    /// already exist; otherwise return the existing one. Idempotent.
    async fn create(
        &self,
        endpoints: Vec<String>,
        is_fork: ForkStatus,
    ) -> Result<Repository, String>;

    /// Optimistically transition `id`'s status, succeeding only if its
    /// current `version` matches `expected_version`.
    async fn set_status(
        &self,
        id: RepositoryId,
        expected_version: u64,
        status: Status,
    ) -> Result<bool, String>;

    /// Transactionally persist a successful job's reference list and
    /// timestamps, transitioning to `fetched`.
    async fn update_fetched(
        &self,
        id: RepositoryId,
        expected_version: u64,
        references: Vec<Reference>,
        fetched_at: i64,
        last_commit_at: Option<i64>,
    ) -> Result<bool, String>;
}

//================================================================================================
// In-memory test double
//================================================================================================

/// A `Mutex<HashMap<...>>`-backed [`Persistence`] implementation for tests.
#[derive(Default)]
pub struct InMemoryPersistence {
    repos: Mutex<HashMap<RepositoryId, Repository>>,
}

impl InMemoryPersistence {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: insert a `pending` repository with a deterministic id
    /// derived from the number of records already seeded.
    pub async fn seed_pending(&self, endpoints: Vec<String>) -> RepositoryId {
        let mut repos = self.repos.lock().expect("lock poisoned");
        let mut bytes = [0u8; 16];
        bytes[15] = repos.len() as u8;
        let id = RepositoryId::from_bytes(bytes);
        repos.insert(
            id,
            Repository {
                id,
                endpoints,
                is_fork: ForkStatus::Unknown,
                status: Status::Pending,
                created_at: 0,
                fetched_at: None,
                last_commit_at: None,
                references: Vec::new(),
                version: 0,
            },
        );
        id
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn get_by_id(&self, id: RepositoryId) -> Result<Repository, String> {
        self.repos
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("no repository {id}"))
    }

    async fn get_by_endpoints(&self, url: &str) -> Result<Vec<Repository>, String> {
        Ok(self
            .repos
            .lock()
            .expect("lock poisoned")
            .values()
            .filter(|r| r.endpoints.iter().any(|e| e == url))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        endpoints: Vec<String>,
        is_fork: ForkStatus,
    ) -> Result<Repository, String> {
        let mut repos = self.repos.lock().expect("lock poisoned");
        if let Some(existing) = repos.values().find(|r| {
            r.endpoints
                .first()
                .zip(endpoints.first())
                .is_some_and(|(a, b)| a == b)
        }) {
            return Ok(existing.clone());
        }
        let mut bytes = [0u8; 16];
        bytes[15] = repos.len() as u8;
        let id = RepositoryId::from_bytes(bytes);
        let repo = Repository {
            id,
            endpoints,
            is_fork,
            status: Status::Pending,
            created_at: 0,
            fetched_at: None,
            last_commit_at: None,
            references: Vec::new(),
            version: 0,
        };
        repos.insert(id, repo.clone());
        Ok(repo)
    }

    async fn set_status(
        &self,
        id: RepositoryId,
        expected_version: u64,
        status: Status,
    ) -> Result<bool, String> {
        let mut repos = self.repos.lock().expect("lock poisoned");
        let Some(repo) = repos.get_mut(&id) else {
            return Err(format!("no repository {id}"));
        };
        if repo.version != expected_version {
            return Ok(false);
        }
        repo.status = status;
        repo.version += 1;
        Ok(true)
    }

    async fn update_fetched(
        &self,
        id: RepositoryId,
        expected_version: u64,
        references: Vec<Reference>,
        fetched_at: i64,
        last_commit_at: Option<i64>,
    ) -> Result<bool, String> {
        let mut repos = self.repos.lock().expect("lock poisoned");
        let Some(repo) = repos.get_mut(&id) else {
            return Err(format!("no repository {id}"));
        };
        if repo.version != expected_version {
            return Ok(false);
        }
        repo.references = references;
        repo.fetched_at = Some(fetched_at);
        repo.last_commit_at = last_commit_at;
        repo.status = Status::Fetched;
        repo.version += 1;
        Ok(true)
    }
}
