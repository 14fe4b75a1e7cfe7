use async_trait::async_trait;
use tokio_rustls::TlsConnector;

use crate::backend::{Backend, Group, User};
use crate::client::Client;
use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::server::transport;

/// A backend that is itself a client of another running daemon. Every
/// call here is a wire round trip to `proxy.host`, serialized through
/// the connection's mutex since the protocol is half-duplex.
///
/// TLS and `client auth` are performed eagerly at construction, so a
/// misconfigured upstream fails the process at startup instead of on
/// the first request a caller happens to make.
pub struct ProxyBackend {
    client: Client,
}

impl ProxyBackend {
    pub async fn connect(conf: &ProxyConfig) -> Result<Self> {
        let client = Client::connect(&conf.host).await?;

        if conf.ssl {
            let cert_path = if conf.cert.is_empty() {
                return Err(Error::new("proxy.ssl is enabled but proxy.cert is not set"));
            } else {
                &conf.cert
            };
            let tls_config = transport::load_client_config(cert_path)?;
            let connector = TlsConnector::from(tls_config);
            let domain = rustls::ServerName::try_from(host_only(&conf.host))
                .map_err(|_| Error::new(format!("invalid proxy.host '{}' for TLS", conf.host)))?;
            client.start_tls(&connector, domain).await?;
        }

        if !conf.passwd.is_empty() {
            client.client_auth(&conf.passwd).await?;
        }

        Ok(ProxyBackend { client })
    }
}

/// Strips a trailing `:<port>` so the remaining text can serve as a
/// TLS server name.
fn host_only(addr: &str) -> &str {
    addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr)
}

#[async_trait]
impl Backend for ProxyBackend {
    async fn create_user(&self, name: &str, password: &str) -> Result<i64> {
        self.client.create_user(name, password).await
    }

    async fn delete_user(&self, nameuid: &str) -> Result<()> {
        self.client.delete_user(nameuid).await
    }

    async fn enable_user(&self, nameuid: &str) -> Result<()> {
        self.client.enable_user(nameuid).await
    }

    async fn disable_user(&self, nameuid: &str) -> Result<()> {
        self.client.disable_user(nameuid).await
    }

    async fn login_user(&self, name: &str, password: &str) -> Result<i64> {
        self.client.login_user(name, password).await
    }

    async fn change_user_password(&self, nameuid: &str, password: &str, newpassword: &str) -> Result<()> {
        self.client.change_user_password(nameuid, password, newpassword).await
    }

    async fn change_user_name(&self, nameuid: &str, password: &str, newname: &str) -> Result<()> {
        self.client.change_user_name(nameuid, password, newname).await
    }

    async fn set_user_data(&self, nameuid: &str, key: &str, value: &str) -> Result<()> {
        self.client.set_user_data(nameuid, key, value).await
    }

    async fn get_user_data(&self, nameuid: &str, key: &str) -> Result<String> {
        self.client.get_user_data(nameuid, key).await
    }

    async fn get_user_data_keys(&self, nameuid: &str) -> Result<Vec<String>> {
        self.client.get_user_data_keys(nameuid).await
    }

    async fn user_groups(&self, nameuid: &str) -> Result<Vec<Group>> {
        self.client.user_groups(nameuid).await
    }

    async fn users(&self) -> Result<Vec<User>> {
        self.client.users().await
    }

    async fn create_group(&self, name: &str) -> Result<i64> {
        self.client.create_group(name).await
    }

    async fn delete_group(&self, groupgid: &str) -> Result<()> {
        self.client.delete_group(groupgid).await
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        self.client.groups().await
    }

    async fn group_users(&self, groupgid: &str) -> Result<Vec<User>> {
        self.client.group_users(groupgid).await
    }

    async fn add_user_to_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        self.client.add_user_to_group(nameuid, groupgid).await
    }

    async fn remove_user_from_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        self.client.remove_user_from_group(nameuid, groupgid).await
    }

    async fn stats(&self) -> Result<Vec<(String, i64)>> {
        Ok(Vec::new())
    }
}
