use async_trait::async_trait;
use sqlx::any::{AnyKind, AnyPool, AnyPoolOptions};
use sqlx::Row;

use crate::backend::{Backend, Group, User};
use crate::error::{Code, Error, Result};

const STATUS_ACTIVE: i64 = 1;
const STATUS_INACTIVE: i64 = 0;

/// Backs the `sqlite`, `mysql` and `postgres` daemon backends with one
/// implementation: `sqlx::AnyPool` dispatches to the right driver at
/// connect time based on the URL scheme, so the same query text and
/// Rust code serve all three, mirroring how the operation logic here
/// is shared regardless of which SQL engine is behind it.
pub struct SqlBackend {
    pool: AnyPool,
    kind: AnyKind,
}

impl SqlBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = AnyPoolOptions::new().max_connections(16).connect(url).await?;
        let kind = pool.any_kind();
        let backend = SqlBackend { pool, kind };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in self.ddl() {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// DDL differs only in how each dialect spells an auto-incrementing
    /// primary key and a cascading foreign key; the table shapes and
    /// constraints are identical across all three.
    fn ddl(&self) -> &'static [&'static str] {
        match self.kind {
            AnyKind::Sqlite => &[
                "CREATE TABLE IF NOT EXISTS Users (
                    uid INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    password TEXT NOT NULL,
                    state INTEGER NOT NULL DEFAULT 1
                )",
                "CREATE TABLE IF NOT EXISTS Groups (
                    gid INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                )",
                "CREATE TABLE IF NOT EXISTS UserGroups (
                    uid INTEGER NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    gid INTEGER NOT NULL REFERENCES Groups(gid) ON UPDATE CASCADE,
                    UNIQUE (uid, gid) ON CONFLICT IGNORE
                )",
                "CREATE TABLE IF NOT EXISTS UserValues (
                    uid INTEGER NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    UNIQUE (uid, key) ON CONFLICT REPLACE
                )",
            ],
            AnyKind::MySql => &[
                "CREATE TABLE IF NOT EXISTS Users (
                    uid BIGINT PRIMARY KEY AUTO_INCREMENT,
                    name VARCHAR(255) NOT NULL UNIQUE,
                    password VARCHAR(255) NOT NULL,
                    state INTEGER NOT NULL DEFAULT 1
                )",
                "CREATE TABLE IF NOT EXISTS Groups (
                    gid BIGINT PRIMARY KEY AUTO_INCREMENT,
                    name VARCHAR(255) NOT NULL UNIQUE
                )",
                "CREATE TABLE IF NOT EXISTS UserGroups (
                    uid BIGINT NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    gid BIGINT NOT NULL REFERENCES Groups(gid) ON UPDATE CASCADE,
                    UNIQUE (uid, gid)
                )",
                "CREATE TABLE IF NOT EXISTS UserValues (
                    uid BIGINT NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    `key` VARCHAR(255) NOT NULL,
                    value TEXT NOT NULL,
                    UNIQUE (uid, `key`)
                )",
            ],
            AnyKind::Postgres => &[
                "CREATE TABLE IF NOT EXISTS Users (
                    uid BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    password TEXT NOT NULL,
                    state INTEGER NOT NULL DEFAULT 1
                )",
                "CREATE TABLE IF NOT EXISTS Groups (
                    gid BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                )",
                "CREATE TABLE IF NOT EXISTS UserGroups (
                    uid BIGINT NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    gid BIGINT NOT NULL REFERENCES Groups(gid) ON UPDATE CASCADE,
                    UNIQUE (uid, gid)
                )",
                "CREATE TABLE IF NOT EXISTS UserValues (
                    uid BIGINT NOT NULL REFERENCES Users(uid) ON UPDATE CASCADE,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    UNIQUE (uid, key)
                )",
            ],
        }
    }

    /// Inserts a row and returns its generated id. Postgres and modern
    /// SQLite support `RETURNING`; MySQL does not, so that branch pins
    /// a single connection across the insert and the follow-up
    /// `LAST_INSERT_ID()` (which is connection-session state).
    async fn insert_returning_id(&self, table: &str, columns: &str, placeholders: &str, args: &[&str]) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        match self.kind {
            AnyKind::MySql => {
                let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, columns, placeholders);
                let mut q = sqlx::query(&sql);
                for a in args {
                    q = q.bind(*a);
                }
                q.execute(&mut *conn).await?;
                let row = sqlx::query("SELECT LAST_INSERT_ID()").fetch_one(&mut *conn).await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
            _ => {
                let id_col = if table == "Groups" { "gid" } else { "uid" };
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                    table, columns, placeholders, id_col
                );
                let mut q = sqlx::query(&sql);
                for a in args {
                    q = q.bind(*a);
                }
                let row = q.fetch_one(&mut *conn).await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
        }
    }

    async fn resolve_uid(&self, nameuid: &str) -> Result<i64> {
        let guess = nameuid.parse::<i64>().unwrap_or(-1);
        let row = sqlx::query("SELECT uid FROM Users WHERE name = ? OR uid = ?")
            .bind(nameuid)
            .bind(guess)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Err(Error::code(Code::Enoent, "Name unknown")),
        }
    }

    async fn resolve_gid(&self, groupgid: &str) -> Result<i64> {
        let guess = groupgid.parse::<i64>().unwrap_or(-1);
        let row = sqlx::query("SELECT gid FROM Groups WHERE name = ? OR gid = ?")
            .bind(groupgid)
            .bind(guess)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Err(Error::code(Code::Enoent, "Name unknown")),
        }
    }

    /// `key` is a reserved word in MySQL and must be backtick-quoted
    /// there; sqlite/postgres accept it bare.
    fn key_col(&self) -> &'static str {
        match self.kind {
            AnyKind::MySql => "`key`",
            _ => "key",
        }
    }

    async fn set_user_state(&self, state: i64, nameuid: &str) -> Result<()> {
        if nameuid.is_empty() {
            return Err(Error::code(Code::Einval, "User name or uid must be given"));
        }
        let guess = nameuid.parse::<i64>().unwrap_or(-1);
        let result = sqlx::query("UPDATE Users SET state = ? WHERE name = ? OR uid = ?")
            .bind(state)
            .bind(nameuid)
            .bind(guess)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::code(Code::Enoent, "User name"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for SqlBackend {
    async fn create_user(&self, name: &str, password: &str) -> Result<i64> {
        if name.is_empty() || password.is_empty() {
            return Err(Error::code(Code::Einval, "User name and password can't be blank"));
        }
        self.insert_returning_id("Users", "name, password", "?, ?", &[name, password]).await
    }

    async fn delete_user(&self, nameuid: &str) -> Result<()> {
        if nameuid.is_empty() {
            return Err(Error::code(Code::Einval, "Name or uid has to be passed"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        // explicit cascade cleanup: DDL carries no ON DELETE CASCADE
        // across engines, so membership/attribute rows are removed here.
        sqlx::query("DELETE FROM UserGroups WHERE uid = ?").bind(uid).execute(&self.pool).await?;
        sqlx::query("DELETE FROM UserValues WHERE uid = ?").bind(uid).execute(&self.pool).await?;
        let result = sqlx::query("DELETE FROM Users WHERE uid = ?").bind(uid).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::code(Code::Enoent, "Name or uid unknown"));
        }
        Ok(())
    }

    async fn enable_user(&self, nameuid: &str) -> Result<()> {
        self.set_user_state(STATUS_ACTIVE, nameuid).await
    }

    async fn disable_user(&self, nameuid: &str) -> Result<()> {
        self.set_user_state(STATUS_INACTIVE, nameuid).await
    }

    async fn login_user(&self, name: &str, password: &str) -> Result<i64> {
        if name.is_empty() || password.is_empty() {
            return Err(Error::code(Code::Einval, "Username and password can't be blank"));
        }
        let row = sqlx::query("SELECT uid FROM Users WHERE name = ? AND password = ? AND state = ?")
            .bind(name)
            .bind(password)
            .bind(STATUS_ACTIVE)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Err(Error::code(Code::Enoent, "Name unknown")),
        }
    }

    async fn change_user_password(&self, nameuid: &str, password: &str, newpassword: &str) -> Result<()> {
        if nameuid.is_empty() || password.is_empty() || newpassword.is_empty() {
            return Err(Error::code(Code::Einval, "nameuid and passwords can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let result = sqlx::query("UPDATE Users SET password = ? WHERE uid = ? AND password = ?")
            .bind(newpassword)
            .bind(uid)
            .bind(password)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::code(Code::Enoent, "Password didn't match"));
        }
        Ok(())
    }

    async fn change_user_name(&self, nameuid: &str, password: &str, newname: &str) -> Result<()> {
        if nameuid.is_empty() || password.is_empty() || newname.is_empty() {
            return Err(Error::code(Code::Einval, "nameuid, password and new name can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let result = sqlx::query("UPDATE Users SET name = ? WHERE uid = ? AND password = ?")
            .bind(newname)
            .bind(uid)
            .bind(password)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::code(Code::Enoent, "Password didn't match"));
        }
        Ok(())
    }

    async fn set_user_data(&self, nameuid: &str, key: &str, value: &str) -> Result<()> {
        if nameuid.is_empty() || key.is_empty() || value.is_empty() {
            return Err(Error::code(Code::Einval, "Name/uid, key and value can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        match self.kind {
            AnyKind::Sqlite => {
                sqlx::query("INSERT INTO UserValues (uid, key, value) VALUES (?, ?, ?)")
                    .bind(uid)
                    .bind(key)
                    .bind(value)
                    .execute(&self.pool)
                    .await?;
            }
            AnyKind::MySql => {
                sqlx::query(
                    "INSERT INTO UserValues (uid, `key`, value) VALUES (?, ?, ?) \
                     ON DUPLICATE KEY UPDATE value = VALUES(value)",
                )
                .bind(uid)
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
            }
            AnyKind::Postgres => {
                sqlx::query(
                    "INSERT INTO UserValues (uid, key, value) VALUES (?, ?, ?) \
                     ON CONFLICT (uid, key) DO UPDATE SET value = EXCLUDED.value",
                )
                .bind(uid)
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn get_user_data(&self, nameuid: &str, key: &str) -> Result<String> {
        if nameuid.is_empty() || key.is_empty() {
            return Err(Error::code(Code::Einval, "Name/uid, key and value can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let sql = format!("SELECT value FROM UserValues WHERE uid = ? AND {} = ?", self.key_col());
        let row = sqlx::query(&sql)
            .bind(uid)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<String, _>(0)?),
            None => Err(Error::code(Code::Enoent, "Key unknown")),
        }
    }

    async fn get_user_data_keys(&self, nameuid: &str) -> Result<Vec<String>> {
        if nameuid.is_empty() {
            return Err(Error::code(Code::Einval, "Name or uid has to be passed"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let sql = format!("SELECT {} FROM UserValues WHERE uid = ?", self.key_col());
        let rows = sqlx::query(&sql)
            .bind(uid)
            .fetch_all(&self.pool)
            .await?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(row.try_get::<String, _>(0)?);
        }
        Ok(keys)
    }

    async fn user_groups(&self, nameuid: &str) -> Result<Vec<Group>> {
        if nameuid.is_empty() {
            return Err(Error::code(Code::Einval, "Name or uid has to be passed"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let rows = sqlx::query(
            "SELECT g.name, g.gid FROM Groups g JOIN UserGroups ug ON (ug.gid = g.gid) WHERE ug.uid = ?",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(Group {
                name: row.try_get::<String, _>(0)?,
                gid: row.try_get::<i64, _>(1)?,
            });
        }
        Ok(groups)
    }

    async fn users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT name, uid, state FROM Users").fetch_all(&self.pool).await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let state: i64 = row.try_get(2)?;
            users.push(User {
                name: row.try_get::<String, _>(0)?,
                uid: row.try_get::<i64, _>(1)?,
                active: state == STATUS_ACTIVE,
            });
        }
        Ok(users)
    }

    async fn create_group(&self, name: &str) -> Result<i64> {
        if name.is_empty() {
            return Err(Error::code(Code::Einval, "Invalid group name"));
        }
        self.insert_returning_id("Groups", "name", "?", &[name]).await
    }

    async fn delete_group(&self, groupgid: &str) -> Result<()> {
        if groupgid.is_empty() {
            return Err(Error::code(Code::Einval, "Name or gid has to be passed"));
        }
        let gid = self.resolve_gid(groupgid).await?;
        sqlx::query("DELETE FROM UserGroups WHERE gid = ?").bind(gid).execute(&self.pool).await?;
        let result = sqlx::query("DELETE FROM Groups WHERE gid = ?").bind(gid).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::code(Code::Enoent, "Name or gid unknown"));
        }
        Ok(())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT name, gid FROM Groups").fetch_all(&self.pool).await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(Group {
                name: row.try_get::<String, _>(0)?,
                gid: row.try_get::<i64, _>(1)?,
            });
        }
        Ok(groups)
    }

    async fn group_users(&self, groupgid: &str) -> Result<Vec<User>> {
        if groupgid.is_empty() {
            return Err(Error::code(Code::Einval, "Name or gid has to be passed"));
        }
        let gid = self.resolve_gid(groupgid).await?;
        let rows = sqlx::query(
            "SELECT u.name, u.uid, u.state FROM Users u JOIN UserGroups ug ON (ug.uid = u.uid) WHERE ug.gid = ?",
        )
        .bind(gid)
        .fetch_all(&self.pool)
        .await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let state: i64 = row.try_get(2)?;
            users.push(User {
                name: row.try_get::<String, _>(0)?,
                uid: row.try_get::<i64, _>(1)?,
                active: state == STATUS_ACTIVE,
            });
        }
        Ok(users)
    }

    async fn add_user_to_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        if nameuid.is_empty() || groupgid.is_empty() {
            return Err(Error::code(Code::Einval, "nameuid and groupgid can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let gid = self.resolve_gid(groupgid).await?;
        // duplicate adds are idempotent: IGNORE (sqlite) / ON CONFLICT DO NOTHING (postgres)
        // / a pre-check (mysql, which has no portable upsert-ignore for plain UNIQUE here)
        match self.kind {
            AnyKind::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO UserGroups (uid, gid) VALUES (?, ?)")
                    .bind(uid)
                    .bind(gid)
                    .execute(&self.pool)
                    .await?;
            }
            AnyKind::Postgres => {
                sqlx::query("INSERT INTO UserGroups (uid, gid) VALUES (?, ?) ON CONFLICT (uid, gid) DO NOTHING")
                    .bind(uid)
                    .bind(gid)
                    .execute(&self.pool)
                    .await?;
            }
            AnyKind::MySql => {
                let existing = sqlx::query("SELECT 1 FROM UserGroups WHERE uid = ? AND gid = ?")
                    .bind(uid)
                    .bind(gid)
                    .fetch_optional(&self.pool)
                    .await?;
                if existing.is_none() {
                    sqlx::query("INSERT INTO UserGroups (uid, gid) VALUES (?, ?)")
                        .bind(uid)
                        .bind(gid)
                        .execute(&self.pool)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, nameuid: &str, groupgid: &str) -> Result<()> {
        if nameuid.is_empty() || groupgid.is_empty() {
            return Err(Error::code(Code::Einval, "nameuid and groupgid can't be blank"));
        }
        let uid = self.resolve_uid(nameuid).await?;
        let gid = self.resolve_gid(groupgid).await?;
        sqlx::query("DELETE FROM UserGroups WHERE uid = ? AND gid = ?")
            .bind(uid)
            .bind(gid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Vec<(String, i64)>> {
        let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Users").fetch_one(&self.pool).await?;
        let groups: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Groups").fetch_one(&self.pool).await?;
        Ok(vec![("Users".to_string(), users.0), ("Groups".to_string(), groups.0)])
    }
}
