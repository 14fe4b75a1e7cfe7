use tokio::io::AsyncWrite;

use crate::backend::Backend;
use crate::error::{Code, Result};
use crate::protocol::{self, Command};
use crate::stats::Stats;

/// Maps a parsed, already-authorized command to its backend call and
/// writes the formatted response.
///
/// `Command::ClientAuth` and `Command::Quit` are handled by the
/// connection loop itself (they touch per-connection state this
/// function has no access to) and are never passed here.
pub async fn dispatch<W: AsyncWrite + Unpin>(
    cmd: Command,
    backend: &dyn Backend,
    stats: &Stats,
    writer: &mut W,
) -> Result<()> {
    match cmd {
        Command::ClientAuth(_) | Command::Quit => {
            unreachable!("client auth and quit are handled before dispatch")
        }

        Command::Login(name, pw) => match backend.login_user(&name, &pw).await {
            Ok(uid) => {
                stats.login();
                protocol::write_ok_value(writer, uid).await?;
            }
            Err(e) => {
                stats.failed_login();
                protocol::write_err(writer, e.wire_code()).await?;
            }
        },

        Command::User(name, pw) => value_response(writer, backend.create_user(&name, &pw).await).await?,
        Command::DeleteUser(nameuid) => unit_response(writer, backend.delete_user(&nameuid).await).await?,
        Command::Enable(nameuid) => unit_response(writer, backend.enable_user(&nameuid).await).await?,
        Command::Disable(nameuid) => unit_response(writer, backend.disable_user(&nameuid).await).await?,

        Command::ChangePassword(nameuid, old, new) => {
            unit_response(writer, backend.change_user_password(&nameuid, &old, &new).await).await?
        }
        Command::ChangeName(nameuid, pw, new) => {
            unit_response(writer, backend.change_user_name(&nameuid, &pw, &new).await).await?
        }

        Command::Set(nameuid, key, value) => {
            unit_response(writer, backend.set_user_data(&nameuid, &key, &value).await).await?
        }
        Command::Get(nameuid, key) => match backend.get_user_data(&nameuid, &key).await {
            Ok(value) => {
                protocol::write_data(writer, &value).await?;
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },
        Command::GetKeys(nameuid) => match backend.get_user_data_keys(&nameuid).await {
            Ok(keys) => {
                for key in keys {
                    protocol::write_data(writer, &key).await?;
                }
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },

        Command::UserGroups(nameuid) => match backend.user_groups(&nameuid).await {
            Ok(groups) => {
                for group in groups {
                    protocol::write_data(writer, &group.to_wire()).await?;
                }
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },
        Command::Users => match backend.users().await {
            Ok(users) => {
                for user in users {
                    protocol::write_data(writer, &user.to_wire()).await?;
                }
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },

        Command::Group(name) => value_response(writer, backend.create_group(&name).await).await?,
        Command::DeleteGroup(groupgid) => unit_response(writer, backend.delete_group(&groupgid).await).await?,
        Command::Groups => match backend.groups().await {
            Ok(groups) => {
                for group in groups {
                    protocol::write_data(writer, &group.to_wire()).await?;
                }
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },
        Command::GroupUsers(groupgid) => match backend.group_users(&groupgid).await {
            Ok(users) => {
                for user in users {
                    protocol::write_data(writer, &user.to_wire()).await?;
                }
                protocol::write_ok(writer).await?;
            }
            Err(e) => protocol::write_err(writer, e.wire_code()).await?,
        },

        Command::Add(nameuid, groupgid) => {
            unit_response(writer, backend.add_user_to_group(&nameuid, &groupgid).await).await?
        }
        Command::Remove(nameuid, groupgid) => {
            unit_response(writer, backend.remove_user_from_group(&nameuid, &groupgid).await).await?
        }

        Command::Stats => {
            let mut lines: Vec<(String, i64)> = stats.snapshot();
            match backend.stats().await {
                Ok(backend_stats) => {
                    lines.extend(backend_stats);
                    for (name, value) in lines {
                        protocol::write_data(writer, &format!("{}:{}", name, value)).await?;
                    }
                    protocol::write_ok(writer).await?;
                }
                Err(e) => protocol::write_err(writer, e.wire_code()).await?,
            }
        }

        Command::LoginStats(nameuid) => login_stats(writer, backend, &nameuid).await?,
    }
    Ok(())
}

async fn value_response<W: AsyncWrite + Unpin>(writer: &mut W, result: Result<i64>) -> Result<()> {
    match result {
        Ok(value) => protocol::write_ok_value(writer, value).await?,
        Err(e) => protocol::write_err(writer, e.wire_code()).await?,
    }
    Ok(())
}

async fn unit_response<W: AsyncWrite + Unpin>(writer: &mut W, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => protocol::write_ok(writer).await?,
        Err(e) => protocol::write_err(writer, e.wire_code()).await?,
    }
    Ok(())
}

/// Reads the `lastlogin`/`failcount` user-data keys and reports them.
/// A missing key reports as `0`; a present-but-unparseable `lastlogin`
/// reports `NOINT` instead of silently reporting zero, since a bad
/// stored value is a data integrity problem the caller should see.
async fn login_stats<W: AsyncWrite + Unpin>(writer: &mut W, backend: &dyn Backend, nameuid: &str) -> Result<()> {
    let lastlogin = match backend.get_user_data(nameuid, "lastlogin").await {
        Ok(value) => match value.parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                protocol::write_err(writer, Code::Nonint).await?;
                return Ok(());
            }
        },
        Err(e) if e.wire_code() == Code::Enoent => 0,
        Err(e) => {
            protocol::write_err(writer, e.wire_code()).await?;
            return Ok(());
        }
    };

    let failcount = match backend.get_user_data(nameuid, "failcount").await {
        Ok(value) => match value.parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                protocol::write_err(writer, Code::Nonint).await?;
                return Ok(());
            }
        },
        Err(e) if e.wire_code() == Code::Enoent => 0,
        Err(e) => {
            protocol::write_err(writer, e.wire_code()).await?;
            return Ok(());
        }
    };

    protocol::write_data(writer, &format!("lastlogin:{}", lastlogin)).await?;
    protocol::write_data(writer, &format!("failcount:{}", failcount)).await?;
    protocol::write_ok(writer).await?;
    Ok(())
}
