//! Operator accounts.

use sqlx::FromRow;

use crate::{Store, StoreError};

/// Username of the account seeded into an empty database.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// One row of the `users` table.
///
/// Timestamps are SQLite `CURRENT_TIMESTAMP` strings
/// (`YYYY-MM-DD HH:MM:SS`, UTC) and are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub must_change_password: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub last_login: Option<String>,
    pub failed_login_attempts: i64,
    pub locked_until: Option<String>,
}

/// Fields for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub is_admin: bool,
    pub must_change_password: bool,
}

const USER_COLUMNS: &str = "id, username, password_hash, must_change_password, is_admin, \
     created_at, last_login, failed_login_attempts, locked_until";

impl Store {
    /// Inserts the default `admin` account if, and only if, no account
    /// exists yet. Returns whether a row was inserted.
    pub async fn seed_default_admin(&self, password_hash: &str) -> Result<bool, StoreError> {
        if self.count_users().await? > 0 {
            return Ok(false);
        }

        self.insert_user(NewUser {
            username: DEFAULT_ADMIN_USERNAME,
            password_hash,
            is_admin: true,
            must_change_password: true,
        })
        .await?;

        tracing::warn!(
            username = DEFAULT_ADMIN_USERNAME,
            "no users found, created default admin account; password must be changed on first login"
        );
        Ok(true)
    }

    pub async fn count_users(&self) -> Result<i64, StoreError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        let user = sqlx::query_as::<_, UserRecord>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, UserRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// All accounts, oldest first.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let users = sqlx::query_as::<_, UserRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Creates an account and returns its id.
    ///
    /// # Errors
    /// [`StoreError::DuplicateUsername`] if the username is taken; the
    /// table is left unchanged.
    pub async fn insert_user(&self, user: NewUser<'_>) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
                INSERT INTO users (username, password_hash, is_admin, must_change_password)
                VALUES            (?, ?, ?, ?)
            "#,
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.is_admin)
        .bind(user.must_change_password)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUsername(user.username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the password hash and clears `must_change_password`.
    /// Returns whether the account existed.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError> {
        let done = sqlx::query(
            "UPDATE users SET password_hash = ?, must_change_password = 0 WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Stamps `last_login` and resets the failure counter.
    pub async fn record_login_success(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                UPDATE users
                SET last_login = CURRENT_TIMESTAMP,
                    failed_login_attempts = 0,
                    locked_until = NULL
                WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bumps the failure counter for an existing account.
    pub async fn record_login_failure(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = failed_login_attempts + 1 WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_store;

    fn user<'a>(username: &'a str, is_admin: bool) -> NewUser<'a> {
        NewUser {
            username,
            password_hash: "$2b$04$hash",
            is_admin,
            must_change_password: false,
        }
    }

    #[tokio::test]
    async fn test_seed_default_admin_empty_table_inserts_admin() {
        let store = test_store().await;

        assert!(store.seed_default_admin("$2b$04$seed").await.unwrap());

        let admin = store
            .find_user_by_username(DEFAULT_ADMIN_USERNAME)
            .await
            .unwrap()
            .expect("seeded admin");
        assert!(admin.is_admin);
        assert!(admin.must_change_password);
        assert_eq!(admin.password_hash, "$2b$04$seed");
        assert_eq!(admin.failed_login_attempts, 0);
        assert!(admin.last_login.is_none());
    }

    #[tokio::test]
    async fn test_seed_default_admin_existing_users_does_nothing() {
        let store = test_store().await;
        store.insert_user(user("ops", false)).await.unwrap();

        assert!(!store.seed_default_admin("$2b$04$seed").await.unwrap());
        assert_eq!(store.count_users().await.unwrap(), 1);
        assert!(store.find_user_by_username("admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_user_duplicate_returns_error_and_keeps_count() {
        let store = test_store().await;
        store.insert_user(user("ops", false)).await.unwrap();

        let result = store.insert_user(user("ops", true)).await;

        assert!(matches!(result, Err(StoreError::DuplicateUsername(name)) if name == "ops"));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_user_by_id_returns_inserted_row() {
        let store = test_store().await;
        let id = store.insert_user(user("ops", true)).await.unwrap();

        let found = store.find_user_by_id(id).await.unwrap().expect("row");

        assert_eq!(found.username, "ops");
        assert!(found.is_admin);
        assert!(store.find_user_by_id(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_returns_in_insert_order() {
        let store = test_store().await;
        store.insert_user(user("a", true)).await.unwrap();
        store.insert_user(user("b", false)).await.unwrap();

        let names: Vec<_> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();

        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_password_clears_must_change_flag() {
        let store = test_store().await;
        store.seed_default_admin("old").await.unwrap();
        let admin = store.find_user_by_username("admin").await.unwrap().unwrap();

        assert!(store.update_password(admin.id, "new").await.unwrap());

        let admin = store.find_user_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(admin.password_hash, "new");
        assert!(!admin.must_change_password);
        assert!(!store.update_password(9999, "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_login_failure_then_success_resets_counter() {
        let store = test_store().await;
        let id = store.insert_user(user("ops", false)).await.unwrap();

        store.record_login_failure(id).await.unwrap();
        store.record_login_failure(id).await.unwrap();
        let row = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.failed_login_attempts, 2);

        store.record_login_success(id).await.unwrap();
        let row = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.failed_login_attempts, 0);
        assert!(row.last_login.is_some());
    }
}
