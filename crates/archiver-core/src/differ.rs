//! # Reference Differ
//!
//! Computes, per affected root, the additions/modifications/deletions between
//! a repository's previously-persisted reference list and a freshly
//! enumerated one, and rewrites ref names into their namespaced in-archive
//! form.

use std::collections::HashMap;

use crate::model::{RefTarget, Reference, RepositoryId, RootHash};

//================================================================================================
// Types
//================================================================================================

/// The set of changes that must be applied to a single rooted archive.
#[derive(Debug, Default, Clone)]
pub struct RootDiff {
    /// References newly present under this root.
    pub adds: Vec<Reference>,
    /// References whose target or roots changed under this root.
    pub mods: Vec<Reference>,
    /// References that were present under this root but no longer are
    /// (either truly removed, or moved to a different root).
    pub dels: Vec<Reference>,
    /// Symbolic references that should live under this root, already paired
    /// with their rewritten target name.
    pub symbolic: Vec<(Vec<u8>, Vec<u8>)>,
}

//================================================================================================
// Functions
//================================================================================================

/// Diff `old` against `new`, grouping the result by the root each reference
/// belongs to. A reference whose `init()` changed between `old` and `new`
/// appears as a delete under its old root and an add under its new one.
pub fn diff(old: &[Reference], new: &[Reference]) -> HashMap<RootHash, RootDiff> {
    let mut by_root: HashMap<RootHash, RootDiff> = HashMap::new();

    let old_by_name: HashMap<&[u8], &Reference> =
        old.iter().map(|r| (r.name.as_slice(), r)).collect();
    let new_by_name: HashMap<&[u8], &Reference> =
        new.iter().map(|r| (r.name.as_slice(), r)).collect();

    for new_ref in new {
        match old_by_name.get(new_ref.name.as_slice()) {
            None => {
                by_root.entry(new_ref.init()).or_default().adds.push(new_ref.clone());
            },
            Some(old_ref) => {
                if old_ref.init() != new_ref.init() {
                    by_root
                        .entry(old_ref.init())
                        .or_default()
                        .dels
                        .push((*old_ref).clone());
                    by_root.entry(new_ref.init()).or_default().adds.push(new_ref.clone());
                } else if old_ref.target != new_ref.target {
                    by_root
                        .entry(new_ref.init())
                        .or_default()
                        .mods
                        .push(new_ref.clone());
                }
            },
        }
    }

    for old_ref in old {
        if !new_by_name.contains_key(old_ref.name.as_slice()) {
            by_root.entry(old_ref.init()).or_default().dels.push(old_ref.clone());
        }
    }

    by_root
}

/// Rewrite a symbolic ref `name -> target` into its namespaced in-archive
/// form. Rejects the degenerate case where a symbolic ref's namespaced name
/// would equal its namespaced target (a one-node cycle); longer cycles are
/// caught by the underlying ref store refusing the write.
pub fn namespace_symbolic(
    repo: RepositoryId,
    name: &[u8],
    target: &[u8],
) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut namespaced_name = name.to_vec();
    namespaced_name.push(b'/');
    namespaced_name.extend_from_slice(repo.to_string().as_bytes());

    let mut namespaced_target = target.to_vec();
    namespaced_target.push(b'/');
    namespaced_target.extend_from_slice(repo.to_string().as_bytes());

    if namespaced_name == namespaced_target {
        return None;
    }

    Some((namespaced_name, namespaced_target))
}

/// Strip the repository suffix from a namespaced ref name inside an archive,
/// returning `None` if `name` doesn't belong to `repo`.
pub fn owned_by(repo: RepositoryId, namespaced: &[u8]) -> bool {
    let suffix = repo.to_string();
    namespaced.ends_with(suffix.as_bytes())
        && namespaced.get(namespaced.len() - suffix.len() - 1) == Some(&b'/')
}

#[cfg(test)]
mod test {
    use gix::ObjectId;

    use super::*;

    fn oid(byte: u8) -> ObjectId {
        let hex = format!("{:02x}", byte).repeat(20);
        ObjectId::from_hex(hex.as_bytes()).unwrap()
    }

    fn reference(name: &str, target: u8, root: u8) -> Reference {
        Reference {
            name: name.as_bytes().to_vec(),
            target: RefTarget::Direct(oid(target)),
            roots: vec![RootHash::new(oid(root))],
            committed_at: 0,
        }
    }

    #[test]
    fn new_ref_is_an_add() {
        let new = vec![reference("refs/heads/main", 1, 9)];
        let diff = diff(&[], &new);
        let root_diff = &diff[&RootHash::new(oid(9))];
        assert_eq!(root_diff.adds.len(), 1);
        assert!(root_diff.mods.is_empty());
        assert!(root_diff.dels.is_empty());
    }

    #[test]
    fn moved_target_is_a_mod() {
        let old = vec![reference("refs/heads/main", 1, 9)];
        let new = vec![reference("refs/heads/main", 2, 9)];
        let diff = diff(&old, &new);
        let root_diff = &diff[&RootHash::new(oid(9))];
        assert_eq!(root_diff.mods.len(), 1);
    }

    #[test]
    fn removed_ref_is_a_del() {
        let old = vec![reference("refs/heads/gone", 1, 9)];
        let diff = diff(&old, &[]);
        let root_diff = &diff[&RootHash::new(oid(9))];
        assert_eq!(root_diff.dels.len(), 1);
    }

    #[test]
    fn root_change_is_del_then_add() {
        let old = vec![reference("refs/heads/main", 1, 9)];
        let new = vec![reference("refs/heads/main", 1, 10)];
        let diff = diff(&old, &new);
        assert_eq!(diff[&RootHash::new(oid(9))].dels.len(), 1);
        assert_eq!(diff[&RootHash::new(oid(10))].adds.len(), 1);
    }

    #[test]
    fn symbolic_namespacing_rejects_self_cycle() {
        let repo = RepositoryId::from_bytes([1; 16]);
        assert!(namespace_symbolic(repo, b"refs/heads/x", b"refs/heads/x").is_none());
        assert!(namespace_symbolic(repo, b"refs/heads/symbolic", b"refs/heads/main").is_some());
    }
}
