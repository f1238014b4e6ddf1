use git2::{ErrorCode, Oid, Repository};

use crate::error::CoreError;
use crate::model::SessionKey;

/// Ref namespace holding each session's snapshot chain tip.
pub const SESSION_REF_PREFIX: &str = "refs/promptledger/sessions/";

/// Ref namespace holding each session's status history tip.
pub const STATUS_REF_PREFIX: &str = "refs/promptledger/status/";

/// refs/promptledger/sessions/<ab>/<sha256(key)>
pub fn session_ref_name(key: &SessionKey) -> String {
    fanout_ref(SESSION_REF_PREFIX, key)
}

/// refs/promptledger/status/<ab>/<sha256(key)>
pub fn status_ref_name(key: &SessionKey) -> String {
    fanout_ref(STATUS_REF_PREFIX, key)
}

fn fanout_ref(prefix: &str, key: &SessionKey) -> String {
    let digest = key.digest();
    format!("{prefix}{}/{digest}", &digest[..2])
}

/// The commit a ref points at, or `None` if the ref does not exist.
pub fn resolve_tip(repo: &Repository, ref_name: &str) -> Result<Option<Oid>, CoreError> {
    match repo.find_reference(ref_name) {
        Ok(reference) => Ok(reference.target()),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create a ref that must not exist yet.
pub fn create_ref(
    repo: &Repository,
    ref_name: &str,
    oid: Oid,
    key: &SessionKey,
) -> Result<(), CoreError> {
    match repo.reference(ref_name, oid, false, "promptledger: create") {
        Ok(_) => Ok(()),
        Err(e) if e.code() == ErrorCode::Exists => Err(CoreError::AlreadyExists {
            key: key.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Move a ref from `expected` to `oid`, failing with `Conflict` if it no
/// longer points at `expected`.
pub fn advance_ref(
    repo: &Repository,
    ref_name: &str,
    oid: Oid,
    expected: Oid,
    key: &SessionKey,
) -> Result<(), CoreError> {
    match repo.reference_matching(ref_name, oid, true, expected, "promptledger: append") {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.code(), ErrorCode::Modified | ErrorCode::Locked) => {
            Err(CoreError::Conflict {
                key: key.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Tips of every session chain in the repository.
pub fn list_session_tips(repo: &Repository) -> Result<Vec<Oid>, CoreError> {
    let mut tips = Vec::new();
    let pattern = format!("{SESSION_REF_PREFIX}*/*");
    for reference in repo.references_glob(&pattern)? {
        if let Some(oid) = reference?.target() {
            tips.push(oid);
        }
    }
    Ok(tips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dummy_commit(repo: &Repository, msg: &str) -> Oid {
        let blob_oid = repo.blob(msg.as_bytes()).unwrap();
        let mut tb = repo.treebuilder(None).unwrap();
        tb.insert("test", blob_oid, 0o100644).unwrap();
        let tree_oid = tb.write().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = git2::Signature::now("test", "test@test").unwrap();
        repo.commit(None, &sig, &sig, msg, &tree, &[]).unwrap()
    }

    #[test]
    fn test_ref_names_fan_out_by_digest() {
        let key = SessionKey::from("demo");
        let digest = key.digest();
        assert_eq!(
            session_ref_name(&key),
            format!("refs/promptledger/sessions/{}/{digest}", &digest[..2])
        );
        assert!(status_ref_name(&key).starts_with(STATUS_REF_PREFIX));
        // Keys that are not valid ref components still yield valid ref names.
        let odd = SessionKey::from("a b/..:*~");
        assert!(git2::Reference::is_valid_name(&session_ref_name(&odd)));
    }

    #[test]
    fn test_create_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let key = SessionKey::from("s1");
        let name = session_ref_name(&key);
        let oid = dummy_commit(&repo, "one");

        assert_eq!(resolve_tip(&repo, &name).unwrap(), None);
        create_ref(&repo, &name, oid, &key).unwrap();
        assert_eq!(resolve_tip(&repo, &name).unwrap(), Some(oid));

        let other = dummy_commit(&repo, "two");
        assert!(matches!(
            create_ref(&repo, &name, other, &key),
            Err(CoreError::AlreadyExists { .. })
        ));
        assert_eq!(resolve_tip(&repo, &name).unwrap(), Some(oid));
    }

    #[test]
    fn test_advance_is_compare_and_swap() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let key = SessionKey::from("s1");
        let name = session_ref_name(&key);
        let first = dummy_commit(&repo, "one");
        let second = dummy_commit(&repo, "two");
        let third = dummy_commit(&repo, "three");

        create_ref(&repo, &name, first, &key).unwrap();
        advance_ref(&repo, &name, second, first, &key).unwrap();

        // Stale expectation loses.
        assert!(matches!(
            advance_ref(&repo, &name, third, first, &key),
            Err(CoreError::Conflict { .. })
        ));
        assert_eq!(resolve_tip(&repo, &name).unwrap(), Some(second));
    }

    #[test]
    fn test_list_session_tips() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        for key in ["a", "b", "c"] {
            let key = SessionKey::from(key);
            let oid = dummy_commit(&repo, key.as_str());
            create_ref(&repo, &session_ref_name(&key), oid, &key).unwrap();
        }
        // Status refs are not session tips.
        let key = SessionKey::from("a");
        let oid = dummy_commit(&repo, "status");
        create_ref(&repo, &status_ref_name(&key), oid, &key).unwrap();

        assert_eq!(list_session_tips(&repo).unwrap().len(), 3);
    }
}
