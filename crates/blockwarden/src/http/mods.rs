//! `/api/mods*`: the mod library.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{ConnectInfo, Extension, Multipart, Path, State};
use blockwarden_auth::Principal;
use blockwarden_store::{ModRecord, NewAuditEntry};
use serde::Serialize;
use serde_json::{Value, json};

use super::{ApiError, AppState};
use crate::mods::{ModError, ModLibrary};

/// Multipart field the upload is read from.
const UPLOAD_FIELD: &str = "mod";

/// A catalogue row as the frontend sees it.
#[derive(Debug, Serialize)]
pub struct ModView {
    id: i64,
    filename: String,
    original_name: String,
    size: i64,
    active: bool,
    uploaded_at: String,
}

impl From<ModRecord> for ModView {
    fn from(record: ModRecord) -> Self {
        Self {
            id: record.id,
            filename: record.filename,
            original_name: record.original_name,
            size: record.size,
            active: record.active,
            uploaded_at: record.uploaded_at,
        }
    }
}

/// `GET /api/mods`: every mod, newest first, as a bare array.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ModView>>, ApiError> {
    let mods = state.mods.list().await?;
    Ok(Json(mods.into_iter().map(ModView::from).collect()))
}

/// `POST /api/mods` (multipart, field `mod`)
///
/// The name is checked before any bytes are read, and the size cap is
/// enforced while the field streams in.
pub async fn upload(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|_| ModError::MissingFile)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field.file_name().ok_or(ModError::MissingFile)?.to_string();
        ModLibrary::check_name(&original_name)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            data.extend_from_slice(&chunk);
            state.mods.check_size(data.len() as u64)?;
        }
        upload = Some((original_name, data));
        break;
    }

    let (original_name, data) = upload.ok_or(ModError::MissingFile)?;
    let record = state
        .mods
        .store_upload(&original_name, &data, Some(principal.id))
        .await?;

    audit(&state, &principal, "mod_upload", &record, peer).await;

    Ok(Json(json!({
        "success": true,
        "id": record.id,
        "filename": record.original_name,
        "size": record.size,
    })))
}

/// `DELETE /api/mods/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.mods.delete(id).await?;

    audit(&state, &principal, "mod_delete", &record, peer).await;

    Ok(Json(json!({ "success": true })))
}

/// `POST /api/mods/{id}/toggle`
pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let active = state.mods.toggle(id).await?;

    let message = if active { "Mod activated" } else { "Mod deactivated" };
    Ok(Json(json!({ "success": true, "active": active, "message": message })))
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid mod ID".into()))
}

/// Audit failures are logged, never surfaced: the mod operation itself
/// already happened.
async fn audit(
    state: &AppState,
    principal: &Principal,
    action: &str,
    record: &ModRecord,
    peer: SocketAddr,
) {
    let ip = peer.ip().to_string();
    let entry = NewAuditEntry {
        user_id: Some(principal.id),
        action,
        resource: Some(&record.original_name),
        details: Some(&record.filename),
        ip_address: Some(&ip),
    };
    if let Err(e) = state.store.record_audit(entry).await {
        tracing::warn!(action, error = %e, "failed to write audit entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(
            parse_id("abc"),
            Err(ApiError::BadRequest(msg)) if msg == "Invalid mod ID"
        ));
        assert!(parse_id("").is_err());
    }
}
