pub mod nil;
pub mod proxy;
pub mod sql;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: i64,
    pub name: String,
    pub active: bool,
}

impl User {
    /// `<name>:<id>:<Y|N>` wire format for list responses.
    pub fn to_wire(&self) -> String {
        format!("{}:{}:{}", self.name, self.uid, if self.active { 'Y' } else { 'N' })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub gid: i64,
    pub name: String,
}

impl Group {
    /// `<name>:<id>` wire format for list responses.
    pub fn to_wire(&self) -> String {
        format!("{}:{}", self.name, self.gid)
    }
}

/// The storage operation surface every backend implements, driving
/// users, groups, membership and per-user key/value attributes.
///
/// Whenever an argument is documented as `nameuid` or `groupgid`, the
/// backend resolves it by trying it as both a name and a numeric id
/// in the same lookup (see each implementation's `resolve_uid`/
/// `resolve_gid`), returning `ENOENT` if neither matches.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_user(&self, name: &str, password: &str) -> Result<i64>;
    async fn delete_user(&self, nameuid: &str) -> Result<()>;
    async fn enable_user(&self, nameuid: &str) -> Result<()>;
    async fn disable_user(&self, nameuid: &str) -> Result<()>;
    async fn login_user(&self, name: &str, password: &str) -> Result<i64>;
    async fn change_user_password(&self, nameuid: &str, password: &str, newpassword: &str) -> Result<()>;
    async fn change_user_name(&self, nameuid: &str, password: &str, newname: &str) -> Result<()>;
    async fn set_user_data(&self, nameuid: &str, key: &str, value: &str) -> Result<()>;
    async fn get_user_data(&self, nameuid: &str, key: &str) -> Result<String>;
    async fn get_user_data_keys(&self, nameuid: &str) -> Result<Vec<String>>;
    async fn user_groups(&self, nameuid: &str) -> Result<Vec<Group>>;
    async fn users(&self) -> Result<Vec<User>>;
    async fn create_group(&self, name: &str) -> Result<i64>;
    async fn delete_group(&self, groupgid: &str) -> Result<()>;
    async fn groups(&self) -> Result<Vec<Group>>;
    async fn group_users(&self, groupgid: &str) -> Result<Vec<User>>;
    async fn add_user_to_group(&self, nameuid: &str, groupgid: &str) -> Result<()>;
    async fn remove_user_from_group(&self, nameuid: &str, groupgid: &str) -> Result<()>;
    /// Backend-level counters (e.g. total users, total groups), appended
    /// after the server-level stats in a `stats` response.
    async fn stats(&self) -> Result<Vec<(String, i64)>>;
}
