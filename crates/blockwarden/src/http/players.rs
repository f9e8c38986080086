use axum::Json;
use axum::extract::State;
use blockwarden_protocol::{InventorySlot, PlayerId, PlayerState};
use serde_json::{Value, json};

use super::AppState;

/// `GET /api/players`: the live snapshot, sorted by player id.
pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let mut players = state.registry.list_all();
    players.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    Json(json!({ "players": players }))
}

/// `GET /api/players/mock`: one fixed player, for frontend development
/// without a game server.
pub async fn mock() -> Json<Value> {
    tracing::warn!("serving mock player data");
    Json(json!({ "players": [mock_player()] }))
}

fn mock_player() -> PlayerState {
    PlayerState {
        uuid: PlayerId::from("mock-uuid"),
        name: "Steve".into(),
        x: 0.0,
        y: 64.0,
        z: 0.0,
        inventory: vec![InventorySlot {
            slot: 0,
            id: "minecraft:cobblestone".into(),
            count: 64,
        }],
    }
}
