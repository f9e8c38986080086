//! Per-connection handler for the game-side agent socket.
//!
//! Each accepted agent connection gets its own Tokio task running
//! [`handle_agent`]. The flow is:
//!   1. Register the connection in the link table (gets a command queue)
//!   2. Loop: wait for either an inbound frame or a queued command
//!      - frame → decode `PlayerState` → registry update → bind player
//!      - command → encode → send as a text frame
//!   3. On close: the guard unbinds the connection's players and, under
//!      the on-disconnect eviction policy, drops them from the registry
//!
//! A malformed frame never ends the connection. It is logged and skipped.

use std::sync::Arc;

use blockwarden_protocol::{Codec, PlayerId, PlayerState, ProtocolError};
use blockwarden_registry::LiveRegistry;
use blockwarden_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::BlockwardenError;
use crate::agents::AgentLinks;

/// State shared by every agent connection task.
pub(crate) struct AgentState<C: Codec> {
    pub(crate) registry: LiveRegistry,
    pub(crate) links: Arc<AgentLinks>,
    pub(crate) codec: C,
}

/// Drop guard that releases a connection's bindings when the handler
/// exits, including on error or panic.
///
/// Both the link table and the registry use synchronous locks, so the
/// cleanup runs inline in `drop`.
struct LinkGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<AgentState<C>>,
}

impl<C: Codec> Drop for LinkGuard<C> {
    fn drop(&mut self) {
        let players = self.state.links.unregister(self.conn_id);
        let evicted = self.state.registry.evict_disconnected(&players);
        tracing::debug!(
            conn_id = %self.conn_id,
            unbound = players.len(),
            evicted = evicted.len(),
            "agent connection released"
        );
    }
}

/// Handles a single agent connection from accept to close.
pub(crate) async fn handle_agent<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<AgentState<C>>,
) -> Result<(), BlockwardenError> {
    let conn_id = conn.id();
    tracing::info!(%conn_id, peer = %conn.peer_addr(), "agent connected");

    let mut commands = state.links.register(conn_id);
    let _guard = LinkGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(data)) => {
                    ingest(&state, conn_id, &data);
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "agent disconnected");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "agent recv error");
                    break;
                }
            },
            Some(command) = commands.recv() => {
                let bytes = state.codec.encode(&command)?;
                conn.send(&bytes).await?;
                tracing::debug!(%conn_id, ?command, "command sent to agent");
            }
        }
    }

    // _guard drops here → bindings released.
    Ok(())
}

/// Applies one inbound frame. Returns the updated player, or `None` if
/// the frame was discarded.
pub(crate) fn ingest<C: Codec>(
    state: &AgentState<C>,
    conn_id: ConnectionId,
    data: &[u8],
) -> Option<PlayerId> {
    let player = match decode_player(&state.codec, data) {
        Ok(player) => player,
        Err(e) => {
            tracing::warn!(
                %conn_id,
                error = %e,
                frame = %String::from_utf8_lossy(data),
                "discarding invalid agent frame"
            );
            return None;
        }
    };

    let id = player.uuid.clone();
    tracing::trace!(%conn_id, player = %id, name = %player.name, "player update");
    // Bound first so a player visible in the registry is always routable.
    state.links.bind(&id, conn_id);
    state.registry.update(player);
    Some(id)
}

fn decode_player<C: Codec>(codec: &C, data: &[u8]) -> Result<PlayerState, ProtocolError> {
    let player: PlayerState = codec.decode(data)?;
    player.validate()?;
    Ok(player)
}

#[cfg(test)]
mod tests {
    use blockwarden_protocol::JsonCodec;
    use blockwarden_registry::{EvictionPolicy, RegistryConfig};

    use super::*;

    fn state(eviction: EvictionPolicy) -> AgentState<JsonCodec> {
        AgentState {
            registry: LiveRegistry::new(RegistryConfig { eviction }),
            links: Arc::new(AgentLinks::new()),
            codec: JsonCodec,
        }
    }

    #[test]
    fn test_ingest_valid_frame_updates_registry_and_binds() {
        let state = state(EvictionPolicy::Retain);
        let conn = ConnectionId::new(1);

        let id = ingest(
            &state,
            conn,
            br#"{"uuid":"u1","name":"Steve","x":0,"y":64,"z":0,"inventory":[]}"#,
        );

        assert_eq!(id, Some(PlayerId::from("u1")));
        let stored = state.registry.get(&PlayerId::from("u1")).expect("stored");
        assert_eq!(stored.name, "Steve");
        assert_eq!(stored.y, 64.0);
        assert_eq!(state.links.connection_for(&PlayerId::from("u1")), Some(conn));
    }

    #[test]
    fn test_ingest_non_json_leaves_registry_unchanged() {
        let state = state(EvictionPolicy::Retain);

        assert_eq!(ingest(&state, ConnectionId::new(1), b"hello there"), None);
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_ingest_missing_name_is_discarded() {
        let state = state(EvictionPolicy::Retain);

        assert_eq!(ingest(&state, ConnectionId::new(1), br#"{"uuid":"u1"}"#), None);
        assert_eq!(ingest(&state, ConnectionId::new(1), br#"{"uuid":"u1","name":""}"#), None);
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_link_guard_on_disconnect_policy_evicts_players() {
        let state = Arc::new(state(EvictionPolicy::OnDisconnect));
        let conn = ConnectionId::new(3);
        let _rx = state.links.register(conn);
        ingest(&state, conn, br#"{"uuid":"u1","name":"Steve"}"#);

        drop(LinkGuard {
            conn_id: conn,
            state: Arc::clone(&state),
        });

        assert!(state.registry.is_empty());
        assert_eq!(state.links.connection_count(), 0);
    }

    #[test]
    fn test_link_guard_retain_policy_keeps_players() {
        let state = Arc::new(state(EvictionPolicy::Retain));
        let conn = ConnectionId::new(4);
        let _rx = state.links.register(conn);
        ingest(&state, conn, br#"{"uuid":"u1","name":"Steve"}"#);

        drop(LinkGuard {
            conn_id: conn,
            state: Arc::clone(&state),
        });

        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.links.connection_for(&PlayerId::from("u1")), None);
    }
}
