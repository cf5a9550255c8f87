//! # Git-Backed Rooted-Archive Store
//!
//! The concrete [`RootedArchiveStore`] implementation: each rooted archive is
//! a bare git repository at a bucketed path, copy-on-write under its
//! transaction so concurrent readers never see a half-applied commit, and
//! published by an atomic rename of the transaction file over the published
//! name.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::RootHash;
use crate::store::{self, RootedArchiveStore, Transaction};

//================================================================================================
// Types
//================================================================================================

/// A [`RootedArchiveStore`] rooted at a single directory on disk.
pub struct GitStore {
    root: PathBuf,
    bucket_depth: u8,
}

struct GitTransaction {
    published_path: PathBuf,
    tx_path: PathBuf,
    repo: Option<gix::Repository>,
    done: bool,
}

//================================================================================================
// Impls
//================================================================================================

impl GitStore {
    /// Open (or initialize) a store rooted at `root`, stamping or verifying
    /// its bucket depth.
    pub fn open(root: impl Into<PathBuf>, bucket_depth: u8) -> Result<Self, StoreError> {
        let root = root.into();
        store::assert_bucket_depth(&root, bucket_depth)?;
        Ok(Self { root, bucket_depth })
    }
}

impl RootedArchiveStore for GitStore {
    fn begin(&self, root: RootHash) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let published_path = store::bucketed_path(&self.root, root, self.bucket_depth);
        let tx_path = published_path.with_extension("siva.tx");
        let tmp_path = published_path.with_extension("siva.tmp");

        if let Some(parent) = tx_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if published_path.exists() {
            copy_repo(&published_path, &tx_path)?;
        } else if tmp_path.exists() {
            // The canonical name is gone but a `.tmp` sibling survives: some
            // prior writer crashed mid-publish, or the published archive was
            // otherwise moved out of place. This root had history before, so
            // silently starting over here would quietly lose it; surface the
            // archive as missing instead. Leave the `.tmp` file untouched —
            // it's the operator's only path to recovery, by renaming it back.
            return Err(StoreError::ArchiveCorrupt);
        } else {
            gix::init_bare(&tx_path).map_err(Box::new)?;
        }

        let repo = gix::open(&tx_path).map_err(Box::new)?;

        Ok(Box::new(GitTransaction {
            published_path,
            tx_path,
            repo: Some(repo),
            done: false,
        }))
    }
}

impl Transaction for GitTransaction {
    fn repo(&self) -> &gix::Repository {
        self.repo.as_ref().expect("repo only taken on commit/rollback")
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        drop(self.repo.take());
        if self.published_path.exists() {
            std::fs::remove_dir_all(&self.published_path)?;
        }
        std::fs::rename(&self.tx_path, &self.published_path)?;
        self.done = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) {
        drop(self.repo.take());
        self.done = true;
        let _ = std::fs::remove_dir_all(&self.tx_path);
    }
}

impl Drop for GitTransaction {
    fn drop(&mut self) {
        if !self.done {
            let _ = std::fs::remove_dir_all(&self.tx_path);
        }
    }
}

/// Recursively copy a published archive directory into a fresh transaction
/// path so the transaction can mutate it without affecting concurrent
/// readers of the still-published original.
fn copy_repo(from: &Path, to: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_repo(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn begin_creates_empty_archive_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::open(dir.path(), 0).unwrap();
        let root = RootHash::new(
            gix::ObjectId::from_hex(b"aabbccddeeff00112233445566778899aabbccdd").unwrap(),
        );
        let tx = store.begin(root).unwrap();
        assert!(tx.repo().is_bare());
    }

    #[test]
    fn commit_publishes_and_rollback_discards() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::open(dir.path(), 0).unwrap();
        let root = RootHash::new(
            gix::ObjectId::from_hex(b"aabbccddeeff00112233445566778899aabbccdd").unwrap(),
        );

        let tx = store.begin(root).unwrap();
        tx.commit().unwrap();
        let published = store::bucketed_path(dir.path(), root, 0);
        assert!(published.exists());

        let tx2 = store.begin(root).unwrap();
        let tx_path = dir.path().join(format!("{root}.siva.tx"));
        assert!(tx_path.exists());
        tx2.rollback();
        assert!(!tx_path.exists());
        assert!(published.exists());
    }

    #[test]
    fn begin_fails_when_only_tmp_sibling_remains() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitStore::open(dir.path(), 0).unwrap();
        let root = RootHash::new(
            gix::ObjectId::from_hex(b"aabbccddeeff00112233445566778899aabbccdd").unwrap(),
        );

        let tx = store.begin(root).unwrap();
        tx.commit().unwrap();
        let published = store::bucketed_path(dir.path(), root, 0);
        let tmp = published.with_extension("siva.tmp");
        std::fs::rename(&published, &tmp).unwrap();

        let err = store.begin(root).unwrap_err();
        assert!(matches!(err, StoreError::ArchiveCorrupt));
        assert!(tmp.exists(), "the .tmp sibling must survive so it can be restored");

        std::fs::rename(&tmp, &published).unwrap();
        let tx2 = store.begin(root).unwrap();
        assert!(tx2.repo().is_bare());
    }
}
