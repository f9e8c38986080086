//! Audit trail of operator actions.

use crate::{Store, StoreError};

#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry<'a> {
    pub user_id: Option<i64>,
    pub action: &'a str,
    pub resource: Option<&'a str>,
    pub details: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

impl Store {
    pub async fn record_audit(&self, entry: NewAuditEntry<'_>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO audit_logs (user_id, action, resource, details, ip_address)
                VALUES                 (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.details)
        .bind(entry.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewUser, test_store};

    #[tokio::test]
    async fn test_record_audit_rows_land_in_order() {
        let store = test_store().await;
        let user_id = store
            .insert_user(NewUser {
                username: "ops",
                password_hash: "h",
                is_admin: true,
                must_change_password: false,
            })
            .await
            .unwrap();

        store
            .record_audit(NewAuditEntry {
                user_id: Some(user_id),
                action: "login",
                ip_address: Some("127.0.0.1"),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .record_audit(NewAuditEntry {
                user_id: Some(user_id),
                action: "mod.upload",
                resource: Some("sodium.jar"),
                ..Default::default()
            })
            .await
            .unwrap();

        let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT action, resource, ip_address FROM audit_logs ORDER BY id",
        )
        .fetch_all(&store.pool)
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "login");
        assert_eq!(rows[0].2.as_deref(), Some("127.0.0.1"));
        assert_eq!(rows[1].0, "mod.upload");
        assert_eq!(rows[1].1.as_deref(), Some("sodium.jar"));
    }

    #[tokio::test]
    async fn test_record_audit_unknown_user_violates_foreign_key() {
        let store = test_store().await;

        let result = store
            .record_audit(NewAuditEntry {
                user_id: Some(42),
                action: "login",
                ..Default::default()
            })
            .await;

        assert!(result.is_err());
    }
}
