//! End-to-end scenarios, exercising the real listener/connection code
//! over a loopback socket. Numbered to match the scenarios they cover.

use test_env_log::test;

use crate::tests::common::{connect, recv, rule, send, spawn_nil_server, spawn_sqlite_server, test_settings};

#[test(tokio::test)]
async fn scenario_1_connect_create_login() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;

    let banner = recv(&mut io).await;
    assert!(banner.contains("ustack"), "banner was {:?}", banner);

    send(&mut io, "user alice s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "login alice s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "quit").await;
    assert_eq!(recv(&mut io).await, "+ BYE");
}

#[test(tokio::test)]
async fn scenario_2_duplicate_create() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;

    let mut first = connect(addr).await;
    recv(&mut first).await; // banner
    send(&mut first, "user alice s3cret").await;
    assert_eq!(recv(&mut first).await, "+ OK 1");

    let mut second = connect(addr).await;
    recv(&mut second).await; // banner
    send(&mut second, "user alice otherpw").await;
    assert_eq!(recv(&mut second).await, "- EEXIST");
}

#[test(tokio::test)]
async fn scenario_3_disable_then_login() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "user bob pw").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "disable bob").await;
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "login bob pw").await;
    assert_eq!(recv(&mut io).await, "- ENOENT");

    send(&mut io, "enable bob").await;
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "login bob pw").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");
}

#[test(tokio::test)]
async fn scenario_4_set_get_kv() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "user c p").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "set c firstname Tester").await;
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "get c firstname").await;
    assert_eq!(recv(&mut io).await, "Tester");
    assert_eq!(recv(&mut io).await, "+ OK");
}

#[test(tokio::test)]
async fn scenario_5_authorization_deny() {
    let settings = test_settings(vec![rule("s", false, "^(users|groups)")]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "users").await;
    assert_eq!(recv(&mut io).await, "- EACCES");

    send(&mut io, "client auth s").await;
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "users").await;
    assert_eq!(recv(&mut io).await, "- EACCES");

    send(&mut io, "user x y").await;
    assert_eq!(recv(&mut io).await, "+ OK 0");
}

#[test(tokio::test)]
async fn client_auth_with_no_matching_rule_is_eperm() {
    let settings = test_settings(vec![rule("s", true, "^user ")]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "client auth wrong").await;
    assert_eq!(recv(&mut io).await, "- EPERM");
}

#[test(tokio::test)]
async fn empty_rule_list_permits_everything() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "groups").await;
    assert_eq!(recv(&mut io).await, "+ OK");
}

/// Regression guard for spec.md §9's "case normalization leak": lowercasing
/// for verb/authorization matching must never leak into argument case.
#[test(tokio::test)]
async fn mixed_case_user_can_log_in_with_same_case() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "USER Alice s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "LOGIN Alice s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");
}

#[test(tokio::test)]
async fn unknown_command_does_not_close_connection() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "frobnicate").await;
    assert_eq!(recv(&mut io).await, "- EFAULT");

    // connection still alive
    send(&mut io, "quit").await;
    assert_eq!(recv(&mut io).await, "+ BYE");
}

/// spec.md §7: EINVAL covers "missing argument count", distinct from
/// EFAULT's "unknown command" — a known verb with too few arguments
/// must not collapse into the unknown-command code.
#[test(tokio::test)]
async fn missing_args_on_known_verb_is_einval() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "login alice").await;
    assert_eq!(recv(&mut io).await, "- EINVAL");
}

/// spec.md §8: "N successful logins increment Login by N and do not
/// touch FailedLogin; failed ones behave symmetrically", exercised
/// through the real `stats` wire response rather than the `Stats` unit
/// directly.
#[test(tokio::test)]
async fn stats_reports_login_and_failed_login_counts() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "user hank s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    send(&mut io, "login hank s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");
    send(&mut io, "login hank s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");
    send(&mut io, "login hank wrongpw").await;
    assert_eq!(recv(&mut io).await, "- ENOENT");

    send(&mut io, "stats").await;
    let mut lines = Vec::new();
    loop {
        let line = recv(&mut io).await;
        if line == "+ OK" {
            break;
        }
        lines.push(line);
    }
    assert!(lines.contains(&"logins:2".to_string()), "lines were {:?}", lines);
    assert!(lines.contains(&"failedlogins:1".to_string()), "lines were {:?}", lines);
    assert!(lines.contains(&"Users:1".to_string()), "lines were {:?}", lines);
}

#[test(tokio::test)]
async fn loginstats_reports_lastlogin_and_failcount() {
    let settings = test_settings(vec![]);
    let (addr, _shutdown, _dir) = spawn_sqlite_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "user ivy s3cret").await;
    assert_eq!(recv(&mut io).await, "+ OK 1");

    // neither key set yet: both report as 0
    send(&mut io, "loginstats ivy").await;
    assert_eq!(recv(&mut io).await, "lastlogin:0");
    assert_eq!(recv(&mut io).await, "failcount:0");
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "set ivy lastlogin 1700000000").await;
    assert_eq!(recv(&mut io).await, "+ OK");
    send(&mut io, "set ivy failcount 3").await;
    assert_eq!(recv(&mut io).await, "+ OK");

    send(&mut io, "loginstats ivy").await;
    assert_eq!(recv(&mut io).await, "lastlogin:1700000000");
    assert_eq!(recv(&mut io).await, "failcount:3");
    assert_eq!(recv(&mut io).await, "+ OK");

    // an unparseable stored value reports NOINT, not a silent zero
    send(&mut io, "set ivy lastlogin notanumber").await;
    assert_eq!(recv(&mut io).await, "+ OK");
    send(&mut io, "loginstats ivy").await;
    assert_eq!(recv(&mut io).await, "- NOINT");
}
