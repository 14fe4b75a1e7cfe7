use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;

use crate::backend::{Group, User};
use crate::error::{Code, Error, Result};
use crate::protocol::codec;
use crate::server::transport::Transport;

/// Speaks the same wire protocol the daemon serves, usable standalone
/// by applications and internally by [`crate::backend::proxy::ProxyBackend`].
///
/// Every command method locks the connection for the duration of its
/// request/response round trip: the protocol is half-duplex, so two
/// concurrent callers sharing a `Client` must not interleave their
/// reads and writes on the same stream.
pub struct Client {
    transport: Mutex<Transport>,
}

impl Client {
    /// Dials `addr`, reads the banner, and verifies it names this protocol.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut transport = Transport::plain(stream);
        let banner = codec::read_line(transport.io())
            .await?
            .ok_or_else(|| Error::new("connection closed before banner"))?;
        if !banner.contains("ustack") {
            return Err(Error::new("not a ustackd server"));
        }
        Ok(Client {
            transport: Mutex::new(transport),
        })
    }

    /// Sends `starttls` and performs the TLS handshake. No response
    /// line is expected for `starttls` itself.
    pub async fn start_tls(&self, connector: &TlsConnector, domain: rustls::ServerName) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), "starttls").await?;
        guard.upgrade_client_in_place(connector, domain).await
    }

    /// Performs `client auth <passwd>` for daemons with a nonempty
    /// authorization rule list.
    pub async fn client_auth(&self, passwd: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("client auth {}", passwd)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn create_user(&self, name: &str, password: &str) -> Result<i64> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("user {} {}", name, password)).await?;
        handle_int_response(&mut *guard).await
    }

    pub async fn disable_user(&self, nameuid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("disable {}", nameuid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn enable_user(&self, nameuid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("enable {}", nameuid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn set_user_data(&self, nameuid: &str, key: &str, value: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("set {} {} {}", nameuid, key, value)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn get_user_data(&self, nameuid: &str, key: &str) -> Result<String> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("get {} {}", nameuid, key)).await?;
        let line = codec::read_line(guard.io())
            .await?
            .ok_or_else(|| Error::new("connection closed"))?;
        if let Some(code) = parse_error_line(&line) {
            return Err(Error::code(code, "remote failure"));
        }
        // a value line followed by the `+ OK` terminator
        handle_response(&mut *guard).await?;
        Ok(line)
    }

    pub async fn get_user_data_keys(&self, nameuid: &str) -> Result<Vec<String>> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("getkeys {}", nameuid)).await?;
        let mut keys = Vec::new();
        loop {
            let line = codec::read_line(guard.io())
                .await?
                .ok_or_else(|| Error::new("connection closed"))?;
            if let Some(code) = parse_error_line(&line) {
                return Err(Error::code(code, "remote failure"));
            }
            if line.starts_with("+ ") {
                return Ok(keys);
            }
            keys.push(line);
        }
    }

    pub async fn login_user(&self, name: &str, password: &str) -> Result<i64> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("login {} {}", name, password)).await?;
        handle_int_response(&mut *guard).await
    }

    pub async fn change_user_password(&self, nameuid: &str, password: &str, newpassword: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("change password {} {} {}", nameuid, password, newpassword)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn change_user_name(&self, nameuid: &str, password: &str, newname: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("change name {} {} {}", nameuid, password, newname)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn user_groups(&self, nameuid: &str) -> Result<Vec<Group>> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("user groups {}", nameuid)).await?;
        read_group_list(&mut *guard).await
    }

    pub async fn delete_user(&self, nameuid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("delete user {}", nameuid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), "users").await?;
        read_user_list(&mut *guard).await
    }

    pub async fn create_group(&self, name: &str) -> Result<i64> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("group {}", name)).await?;
        handle_int_response(&mut *guard).await
    }

    pub async fn add_user_to_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("add {} {}", nameuid, groupgid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn remove_user_from_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("remove {} {}", nameuid, groupgid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn delete_group(&self, groupgid: &str) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("delete group {}", groupgid)).await?;
        handle_response(&mut *guard).await
    }

    pub async fn groups(&self) -> Result<Vec<Group>> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), "groups").await?;
        read_group_list(&mut *guard).await
    }

    pub async fn group_users(&self, groupgid: &str) -> Result<Vec<User>> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), &format!("group users {}", groupgid)).await?;
        read_user_list(&mut *guard).await
    }

    pub async fn quit(&self) -> Result<()> {
        let mut guard = self.transport.lock().await;
        codec::write_data(guard.io(), "quit").await?;
        let _ = codec::read_line(guard.io()).await?;
        Ok(())
    }
}

fn parse_error_line(line: &str) -> Option<Code> {
    let rest = line.strip_prefix("- ")?;
    Some(match rest {
        "EINVAL" => Code::Einval,
        "EEXIST" => Code::Eexist,
        "ENOENT" => Code::Enoent,
        "EPERM" => Code::Eperm,
        "EACCES" => Code::Eaccess,
        "NOINT" => Code::Nonint,
        _ => Code::Efault,
    })
}

async fn handle_response(transport: &mut Transport) -> Result<()> {
    let line = codec::read_line(transport.io())
        .await?
        .ok_or_else(|| Error::new("connection closed"))?;
    if let Some(code) = parse_error_line(&line) {
        return Err(Error::code(code, "remote failure"));
    }
    Ok(())
}

async fn handle_int_response(transport: &mut Transport) -> Result<i64> {
    let line = codec::read_line(transport.io())
        .await?
        .ok_or_else(|| Error::new("connection closed"))?;
    if let Some(code) = parse_error_line(&line) {
        return Err(Error::code(code, "remote failure"));
    }
    let value = line
        .rsplit(' ')
        .next()
        .ok_or_else(|| Error::new("malformed response"))?;
    value.parse::<i64>().map_err(|e| Error::new(e.to_string()))
}

async fn read_group_list(transport: &mut Transport) -> Result<Vec<Group>> {
    let mut groups = Vec::new();
    loop {
        let line = codec::read_line(transport.io())
            .await?
            .ok_or_else(|| Error::new("connection closed"))?;
        if let Some(code) = parse_error_line(&line) {
            return Err(Error::code(code, "remote failure"));
        }
        if line.starts_with("+ ") {
            return Ok(groups);
        }
        let mut parts = line.splitn(2, ':');
        let name = parts.next().ok_or_else(|| Error::new("malformed list line"))?;
        let gid = parts
            .next()
            .ok_or_else(|| Error::new(format!("expected two values: {}", line)))?
            .parse::<i64>()
            .map_err(|e| Error::new(e.to_string()))?;
        groups.push(Group {
            gid,
            name: name.to_string(),
        });
    }
}

async fn read_user_list(transport: &mut Transport) -> Result<Vec<User>> {
    let mut users = Vec::new();
    loop {
        let line = codec::read_line(transport.io())
            .await?
            .ok_or_else(|| Error::new("connection closed"))?;
        if let Some(code) = parse_error_line(&line) {
            return Err(Error::code(code, "remote failure"));
        }
        if line.starts_with("+ ") {
            return Ok(users);
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::new(format!("expected three values: {}", line)));
        }
        let uid = parts[1].parse::<i64>().map_err(|e| Error::new(e.to_string()))?;
        users.push(User {
            uid,
            name: parts[0].to_string(),
            active: parts[2] == "Y",
        });
    }
}
