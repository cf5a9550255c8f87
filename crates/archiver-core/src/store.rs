//! # Rooted-Archive Store
//!
//! Opens, mutates, and atomically publishes the per-root-commit archive
//! containers described in the data model. A container is realized here as a
//! bare git object store at a bucketed path; the packfile/container codec
//! itself is treated as an opaque detail the rest of the pipeline never
//! inspects directly.

pub mod git;

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::RootHash;

//================================================================================================
// Types
//================================================================================================

/// An in-progress, exclusively-held modification of one rooted archive.
///
/// Dropping a `Transaction` without calling [`Transaction::commit`] rolls it
/// back, so a job that panics or early-returns mid-apply never leaves a
/// half-written archive published.
pub trait Transaction {
    /// The underlying git repository backing this transaction, opened
    /// read-write against the private transaction file.
    fn repo(&self) -> &gix::Repository;

    /// Atomically publish the transaction's contents, replacing whatever was
    /// previously published for this root.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard the transaction, leaving the previously published archive (if
    /// any) untouched.
    fn rollback(self: Box<Self>);
}

/// The rooted-archive store contract: begin a transaction for a given root.
pub trait RootedArchiveStore {
    /// Begin a transaction for `root`, creating an empty archive if none
    /// exists yet.
    fn begin(&self, root: RootHash) -> Result<Box<dyn Transaction + '_>, StoreError>;
}

//================================================================================================
// Functions
//================================================================================================

/// Compute the bucketed path for a root hash's container, e.g. for
/// `bucket_depth == 2` and hash `abcdef...`, `<store_root>/ab/cd/abcdef....siva`.
///
/// `bucket_depth` must be `0` or `2`; other values are rejected by
/// [`assert_bucket_depth`] before a store is ever opened.
pub fn bucketed_path(store_root: &Path, root: RootHash, bucket_depth: u8) -> PathBuf {
    let hex = root.to_hex();
    let mut path = store_root.to_path_buf();
    if bucket_depth > 0 {
        let depth = bucket_depth as usize;
        path = path.join(&hex[0..depth]).join(&hex[depth..2 * depth]);
    }
    path.join(format!("{hex}.siva"))
}

/// The marker filename a store stamps at its root the first time it is used,
/// recording the bucket depth it was created with.
pub const DEPTH_MARKER: &str = ".bucket-depth";

/// Verify `store_root` is stamped with `configured_depth`, stamping it if
/// this is the first use. Migrating an existing store between depths is out
/// of scope; a mismatch is a hard error.
pub fn assert_bucket_depth(store_root: &Path, configured_depth: u8) -> Result<(), StoreError> {
    std::fs::create_dir_all(store_root)?;
    let marker = store_root.join(DEPTH_MARKER);
    match std::fs::read_to_string(&marker) {
        Ok(contents) => {
            let on_disk: u8 = contents.trim().parse().unwrap_or(configured_depth);
            if on_disk != configured_depth {
                return Err(StoreError::BucketDepthMismatch {
                    configured: configured_depth,
                    on_disk,
                });
            }
            Ok(())
        },
        Err(_) => {
            std::fs::write(&marker, configured_depth.to_string())?;
            Ok(())
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bucketed_path_depth_two() {
        let dir = tempfile::tempdir().unwrap();
        let hash = RootHash::new(
            gix::ObjectId::from_hex(b"aabbccddeeff00112233445566778899aabbccdd").unwrap(),
        );
        let path = bucketed_path(dir.path(), hash, 2);
        assert_eq!(
            path,
            dir.path().join("aa").join("bb").join(format!("{hash}.siva"))
        );
    }

    #[test]
    fn bucketed_path_depth_zero_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        let hash = RootHash::new(
            gix::ObjectId::from_hex(b"aabbccddeeff00112233445566778899aabbccdd").unwrap(),
        );
        let path = bucketed_path(dir.path(), hash, 0);
        assert_eq!(path, dir.path().join(format!("{hash}.siva")));
    }

    #[test]
    fn mismatched_bucket_depth_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert_bucket_depth(dir.path(), 2).unwrap();
        let err = assert_bucket_depth(dir.path(), 0).unwrap_err();
        assert!(matches!(err, StoreError::BucketDepthMismatch { .. }));
    }
}
