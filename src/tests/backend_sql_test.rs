//! Exercises `SqlBackend` directly against an ephemeral SQLite file,
//! covering the invariants from spec.md §8 that are most naturally
//! tested at the backend API rather than over the wire (blank-argument
//! checks can never reach the backend with a literal empty trailing
//! argument through the wire protocol, since the connection loop trims
//! the whole line before parsing).

use test_env_log::test;

use crate::backend::sql::SqlBackend;
use crate::backend::Backend;
use crate::error::Code;

async fn backend() -> (SqlBackend, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").to_string_lossy());
    (SqlBackend::connect(&url).await.expect("connect"), dir)
}

#[test(tokio::test)]
async fn create_user_rejects_blank_fields() {
    let (backend, _dir) = backend().await;
    let err = backend.create_user("alice", "").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Einval);
    let err = backend.create_user("", "secret").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Einval);
}

#[test(tokio::test)]
async fn login_rejects_blank_password() {
    let (backend, _dir) = backend().await;
    backend.create_user("x", "pw").await.unwrap();
    let err = backend.login_user("x", "").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Einval);
}

#[test(tokio::test)]
async fn create_login_duplicate_invariant() {
    let (backend, _dir) = backend().await;
    let uid = backend.create_user("alice", "s3cret").await.unwrap();
    assert!(uid > 0);

    let err = backend.create_user("alice", "s3cret").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Eexist);

    let login_uid = backend.login_user("alice", "s3cret").await.unwrap();
    assert_eq!(login_uid, uid);
}

#[test(tokio::test)]
async fn disable_enable_cycle() {
    let (backend, _dir) = backend().await;
    backend.create_user("bob", "pw").await.unwrap();

    backend.disable_user("bob").await.unwrap();
    let err = backend.login_user("bob", "pw").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Enoent);

    backend.enable_user("bob").await.unwrap();
    assert!(backend.login_user("bob", "pw").await.is_ok());
}

#[test(tokio::test)]
async fn set_user_data_replace_semantics() {
    let (backend, _dir) = backend().await;
    let uid = backend.create_user("c", "p").await.unwrap();
    let uid_str = uid.to_string();

    backend.set_user_data(&uid_str, "firstname", "Ann").await.unwrap();
    backend.set_user_data(&uid_str, "firstname", "Beth").await.unwrap();
    assert_eq!(backend.get_user_data(&uid_str, "firstname").await.unwrap(), "Beth");
}

#[test(tokio::test)]
async fn nameuid_resolves_by_either_form() {
    let (backend, _dir) = backend().await;
    let uid = backend.create_user("dana", "p").await.unwrap();

    assert!(backend.disable_user("dana").await.is_ok());
    assert!(backend.enable_user(&uid.to_string()).await.is_ok());
}

#[test(tokio::test)]
async fn unresolved_nameuid_is_enoent() {
    let (backend, _dir) = backend().await;
    let err = backend.disable_user("nobody").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Enoent);
}

#[test(tokio::test)]
async fn add_user_to_group_is_idempotent() {
    let (backend, _dir) = backend().await;
    let uid = backend.create_user("eve", "p").await.unwrap();
    let gid = backend.create_group("admins").await.unwrap();
    let (uid_s, gid_s) = (uid.to_string(), gid.to_string());

    backend.add_user_to_group(&uid_s, &gid_s).await.unwrap();
    backend.add_user_to_group(&uid_s, &gid_s).await.unwrap();

    let members = backend.group_users(&gid_s).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].uid, uid);
}

#[test(tokio::test)]
async fn delete_user_cleans_up_membership_and_attributes() {
    let (backend, _dir) = backend().await;
    let uid = backend.create_user("frank", "p").await.unwrap();
    let gid = backend.create_group("staff").await.unwrap();
    let (uid_s, gid_s) = (uid.to_string(), gid.to_string());

    backend.add_user_to_group(&uid_s, &gid_s).await.unwrap();
    backend.set_user_data(&uid_s, "role", "admin").await.unwrap();

    backend.delete_user(&uid_s).await.unwrap();

    // the uid no longer resolves at all, so membership/attribute rows
    // are unreachable even if left orphaned (spec.md §9's cascade-delete
    // open question, resolved here by deleting them explicitly).
    assert_eq!(backend.group_users(&gid_s).await.unwrap().len(), 0);
}

#[test(tokio::test)]
async fn change_password_requires_matching_old_password() {
    let (backend, _dir) = backend().await;
    backend.create_user("gail", "old").await.unwrap();

    let err = backend.change_user_password("gail", "wrong", "new").await.unwrap_err();
    assert_eq!(err.wire_code(), Code::Enoent);

    backend.change_user_password("gail", "old", "new").await.unwrap();
    assert!(backend.login_user("gail", "new").await.is_ok());
}

#[test(tokio::test)]
async fn stats_reports_user_and_group_counts() {
    let (backend, _dir) = backend().await;
    backend.create_user("a", "p").await.unwrap();
    backend.create_user("b", "p").await.unwrap();
    backend.create_group("g").await.unwrap();

    let stats = backend.stats().await.unwrap();
    assert!(stats.contains(&("Users".to_string(), 2)));
    assert!(stats.contains(&("Groups".to_string(), 1)));
}
