//! # Repository State Machine
//!
//! The legal status transitions for a [`Repository`] record, enforced
//! atomically against the persistence backend via optimistic-concurrency
//! (`version`) checks.

use crate::error::StateError;
use crate::model::{Repository, Status};
use crate::persistence::Persistence;

//================================================================================================
// Functions
//================================================================================================

/// Begin a job against `repository_id`: transition `pending -> fetching`.
///
/// Per the conflict rule, if the record is already `fetching`, this fails
/// fast with [`StateError::AlreadyFetching`] without mutating anything —
/// some other worker's job (or our own caller, via an earlier transition) is
/// already responsible for it.
pub async fn begin(
    store: &dyn Persistence,
    repository_id: crate::model::RepositoryId,
) -> Result<Repository, StateError> {
    let repo = store
        .get_by_id(repository_id)
        .await
        .map_err(StateError::Backend)?;

    if repo.status == Status::Fetching {
        return Err(StateError::AlreadyFetching(repository_id));
    }

    let updated = store
        .set_status(repository_id, repo.version, Status::Fetching)
        .await
        .map_err(StateError::Backend)?;

    if !updated {
        return Err(StateError::VersionConflict(repository_id));
    }

    store
        .get_by_id(repository_id)
        .await
        .map_err(StateError::Backend)
}

/// Transition `fetching -> pending` after a retryable failure, or directly
/// to a terminal status (`not-found`, `auth-required`) for the errors the
/// state machine treats as final.
pub async fn finish_with_error(
    store: &dyn Persistence,
    repository_id: crate::model::RepositoryId,
    version: u64,
    terminal: Option<Status>,
) -> Result<(), StateError> {
    let target = terminal.unwrap_or(Status::Pending);
    let updated = store
        .set_status(repository_id, version, target)
        .await
        .map_err(StateError::Backend)?;
    if !updated {
        return Err(StateError::VersionConflict(repository_id));
    }
    Ok(())
}

/// Record a successful job: persist the new reference list and timestamps,
/// and transition to `fetched`.
pub async fn finish_success(
    store: &dyn Persistence,
    repository_id: crate::model::RepositoryId,
    version: u64,
    references: Vec<crate::model::Reference>,
    fetched_at: i64,
    last_commit_at: Option<i64>,
) -> Result<(), StateError> {
    let updated = store
        .update_fetched(repository_id, version, references, fetched_at, last_commit_at)
        .await
        .map_err(StateError::Backend)?;
    if !updated {
        return Err(StateError::VersionConflict(repository_id));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::persistence::InMemoryPersistence;

    use super::*;

    #[tokio::test]
    async fn begin_transitions_pending_to_fetching() {
        let store = InMemoryPersistence::new();
        let id = store.seed_pending(vec!["https://example.com/r".into()]).await;

        let repo = begin(&store, id).await.unwrap();
        assert_eq!(repo.status, Status::Fetching);
    }

    #[tokio::test]
    async fn begin_fails_fast_without_mutating_when_already_fetching() {
        let store = InMemoryPersistence::new();
        let id = store.seed_pending(vec!["https://example.com/r".into()]).await;
        begin(&store, id).await.unwrap();

        let before = store.get_by_id(id).await.unwrap();
        let err = begin(&store, id).await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyFetching(_)));

        let after = store.get_by_id(id).await.unwrap();
        assert_eq!(before.version, after.version);
        assert_eq!(after.status, Status::Fetching);
    }

    #[tokio::test]
    async fn finish_with_error_resets_to_pending_by_default() {
        let store = InMemoryPersistence::new();
        let id = store.seed_pending(vec!["https://example.com/r".into()]).await;
        let repo = begin(&store, id).await.unwrap();

        finish_with_error(&store, id, repo.version, None).await.unwrap();
        let after = store.get_by_id(id).await.unwrap();
        assert_eq!(after.status, Status::Pending);
    }

    #[tokio::test]
    async fn finish_with_error_can_set_a_terminal_status() {
        let store = InMemoryPersistence::new();
        let id = store.seed_pending(vec!["https://example.com/r".into()]).await;
        let repo = begin(&store, id).await.unwrap();

        finish_with_error(&store, id, repo.version, Some(Status::NotFound))
            .await
            .unwrap();
        let after = store.get_by_id(id).await.unwrap();
        assert_eq!(after.status, Status::NotFound);
    }
}
