//! The mod library: `.jar` files in the server's mods directory plus
//! their catalogue rows.
//!
//! Uploads are stored under a generated name
//! (`<unix-millis>-<6 base36 chars>.jar`) so two uploads of `sodium.jar`
//! never collide. The name the operator uploaded is kept in the store.

use std::path::{Path, PathBuf};

use blockwarden_store::{ModRecord, NewMod, Store, StoreError};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Default upload cap: 100 MiB.
pub const DEFAULT_MAX_MOD_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ModError {
    #[error("Mod file is required")]
    MissingFile,

    #[error("Only .jar files are allowed")]
    NotAJar,

    #[error("Mod file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("Mod not found")]
    NotFound,

    #[error("mod file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Mods directory plus the catalogue that describes it.
#[derive(Debug, Clone)]
pub struct ModLibrary {
    dir: PathBuf,
    max_size: u64,
    store: Store,
}

impl ModLibrary {
    pub fn new(dir: impl Into<PathBuf>, max_size: u64, store: Store) -> Self {
        Self {
            dir: dir.into(),
            max_size,
            store,
        }
    }

    /// Creates the mods directory if it doesn't exist.
    pub async fn ensure_dir(&self) -> Result<(), ModError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Checks an upload's original file name before any bytes are read.
    pub fn check_name(original_name: &str) -> Result<(), ModError> {
        let is_jar = Path::new(original_name)
            .extension()
            .is_some_and(|ext| ext == "jar");
        if is_jar { Ok(()) } else { Err(ModError::NotAJar) }
    }

    /// Fails once `received` bytes exceed the upload cap.
    pub fn check_size(&self, received: u64) -> Result<(), ModError> {
        if received > self.max_size {
            return Err(ModError::TooLarge {
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Writes an upload to disk and records it. The file is removed again
    /// if the record can't be written.
    pub async fn store_upload(
        &self,
        original_name: &str,
        data: &[u8],
        uploaded_by: Option<i64>,
    ) -> Result<ModRecord, ModError> {
        Self::check_name(original_name)?;
        self.check_size(data.len() as u64)?;

        let filename = generate_filename();
        let path = self.dir.join(&filename);
        let checksum = hex::encode(Sha256::digest(data));

        tokio::fs::write(&path, data).await?;

        let inserted = self
            .store
            .insert_mod(NewMod {
                filename: &filename,
                original_name,
                size: data.len() as i64,
                uploaded_by,
                checksum: &checksum,
            })
            .await;

        match inserted {
            Ok(record) => {
                tracing::info!(
                    id = record.id,
                    %filename,
                    original = %original_name,
                    size = record.size,
                    "mod uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %rm,
                        "failed to remove orphaned upload"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// All mods, newest first.
    pub async fn list(&self) -> Result<Vec<ModRecord>, ModError> {
        Ok(self.store.list_mods().await?)
    }

    /// Flips a mod's active flag and returns the new value. The file on
    /// disk is not touched.
    pub async fn toggle(&self, id: i64) -> Result<bool, ModError> {
        let record = self.store.find_mod(id).await?.ok_or(ModError::NotFound)?;
        let active = !record.active;
        self.store.set_mod_active(id, active).await?;
        tracing::info!(id, active, "mod toggled");
        Ok(active)
    }

    /// Deletes a mod's file and record. A file that can't be removed is
    /// logged and the record is deleted anyway.
    pub async fn delete(&self, id: i64) -> Result<ModRecord, ModError> {
        let record = self.store.find_mod(id).await?.ok_or(ModError::NotFound)?;

        let path = self.dir.join(&record.filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete mod file");
            }
        }

        self.store.delete_mod(id).await?;
        tracing::info!(id, filename = %record.filename, "mod deleted");
        Ok(record)
    }
}

fn generate_filename() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| std::char::from_digit(rng.random_range(0..36), 36))
        .collect();
    format!("{millis}-{suffix}.jar")
}
