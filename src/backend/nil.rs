use async_trait::async_trait;

use crate::backend::{Backend, Group, User};
use crate::error::Result;

/// A backend that stores nothing. Every mutating call succeeds
/// trivially; every read returns empty. Useful for exercising the
/// protocol and authorization layers without a database.
#[derive(Debug, Default)]
pub struct NilBackend;

impl NilBackend {
    pub fn new() -> Self {
        NilBackend
    }
}

#[async_trait]
impl Backend for NilBackend {
    async fn create_user(&self, _name: &str, _password: &str) -> Result<i64> {
        Ok(0)
    }

    async fn delete_user(&self, _nameuid: &str) -> Result<()> {
        Ok(())
    }

    async fn enable_user(&self, _nameuid: &str) -> Result<()> {
        Ok(())
    }

    async fn disable_user(&self, _nameuid: &str) -> Result<()> {
        Ok(())
    }

    async fn login_user(&self, _name: &str, _password: &str) -> Result<i64> {
        Ok(0)
    }

    async fn change_user_password(&self, _nameuid: &str, _password: &str, _newpassword: &str) -> Result<()> {
        Ok(())
    }

    async fn change_user_name(&self, _nameuid: &str, _password: &str, _newname: &str) -> Result<()> {
        Ok(())
    }

    async fn set_user_data(&self, _nameuid: &str, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn get_user_data(&self, _nameuid: &str, _key: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn get_user_data_keys(&self, _nameuid: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn user_groups(&self, _nameuid: &str) -> Result<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(Vec::new())
    }

    async fn create_group(&self, _name: &str) -> Result<i64> {
        Ok(0)
    }

    async fn delete_group(&self, _groupgid: &str) -> Result<()> {
        Ok(())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn group_users(&self, _groupgid: &str) -> Result<Vec<User>> {
        Ok(Vec::new())
    }

    async fn add_user_to_group(&self, _nameuid: &str, _groupgid: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_user_from_group(&self, _nameuid: &str, _groupgid: &str) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<Vec<(String, i64)>> {
        Ok(Vec::new())
    }
}
