//! The uploaded mod catalogue. The files themselves live on disk; this
//! table only remembers them.

use sqlx::FromRow;

use crate::{Store, StoreError};

/// One row of the `mods` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ModRecord {
    pub id: i64,
    /// Name of the file inside the mods directory.
    pub filename: String,
    /// Name the file had on the uploader's machine.
    pub original_name: String,
    pub size: i64,
    pub active: bool,
    pub uploaded_at: String,
    pub uploaded_by: Option<i64>,
    /// Lowercase hex sha256 of the file contents.
    pub checksum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMod<'a> {
    pub filename: &'a str,
    pub original_name: &'a str,
    pub size: i64,
    pub uploaded_by: Option<i64>,
    pub checksum: &'a str,
}

const MOD_COLUMNS: &str =
    "id, filename, original_name, size, active, uploaded_at, uploaded_by, checksum";

impl Store {
    /// All mods, newest upload first.
    pub async fn list_mods(&self) -> Result<Vec<ModRecord>, StoreError> {
        let query = format!("SELECT {MOD_COLUMNS} FROM mods ORDER BY uploaded_at DESC, id DESC");
        let mods = sqlx::query_as::<_, ModRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(mods)
    }

    /// Records a stored upload (active by default) and returns the row.
    pub async fn insert_mod(&self, new: NewMod<'_>) -> Result<ModRecord, StoreError> {
        let id = sqlx::query(
            r#"
                INSERT INTO mods (filename, original_name, size, uploaded_by, checksum)
                VALUES           (?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.filename)
        .bind(new.original_name)
        .bind(new.size)
        .bind(new.uploaded_by)
        .bind(new.checksum)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.find_mod(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn find_mod(&self, id: i64) -> Result<Option<ModRecord>, StoreError> {
        let query = format!("SELECT {MOD_COLUMNS} FROM mods WHERE id = ?");
        let found = sqlx::query_as::<_, ModRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    /// Sets the active flag. Returns whether the mod existed.
    pub async fn set_mod_active(&self, id: i64, active: bool) -> Result<bool, StoreError> {
        let done = sqlx::query("UPDATE mods SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Deletes the record. Returns whether the mod existed.
    pub async fn delete_mod(&self, id: i64) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM mods WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
