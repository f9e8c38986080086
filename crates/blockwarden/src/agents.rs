//! The agent link table: which agent connection reported which player,
//! and how to reach that connection.
//!
//! The ingress registers every accepted connection and binds each player
//! it reports. The HTTP surface looks a player up here to push a command
//! down the right socket.
//!
//! ```text
//! PlayerId ──players──→ ConnectionId ──outboxes──→ command queue → socket
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use blockwarden_protocol::{AgentCommand, PlayerId};
use blockwarden_transport::ConnectionId;
use tokio::sync::mpsc;

/// Why a command could not be queued for a player.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    /// No live connection has reported this player.
    #[error("no agent connection for player {0}")]
    NotLinked(PlayerId),

    /// The connection is closing and no longer drains its queue.
    #[error("agent connection {0} is closed")]
    Closed(ConnectionId),
}

#[derive(Debug, Default)]
struct LinkTable {
    players: HashMap<PlayerId, ConnectionId>,
    reported: HashMap<ConnectionId, HashSet<PlayerId>>,
    outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<AgentCommand>>,
}

/// Thread-safe table of agent connections and the players they carry.
#[derive(Debug, Default)]
pub struct AgentLinks {
    table: Mutex<LinkTable>,
}

impl AgentLinks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LinkTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection and returns the receiving end of its
    /// command queue.
    pub fn register(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<AgentCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.table();
        table.outboxes.insert(conn, tx);
        table.reported.entry(conn).or_default();
        rx
    }

    /// Records that `conn` carries `player`. A player reported by a new
    /// connection moves to it.
    pub fn bind(&self, player: &PlayerId, conn: ConnectionId) {
        let mut table = self.table();
        let previous = table.players.insert(player.clone(), conn);
        if let Some(old) = previous.filter(|old| *old != conn) {
            if let Some(set) = table.reported.get_mut(&old) {
                set.remove(player);
            }
        }
        table.reported.entry(conn).or_default().insert(player.clone());
    }

    /// Forgets a closed connection. Returns the players that were bound
    /// to it (and are now bound to nothing).
    pub fn unregister(&self, conn: ConnectionId) -> Vec<PlayerId> {
        let mut table = self.table();
        table.outboxes.remove(&conn);
        let players: Vec<PlayerId> = table
            .reported
            .remove(&conn)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for player in &players {
            if table.players.get(player) == Some(&conn) {
                table.players.remove(player);
            }
        }
        players
    }

    /// Queues `command` on the connection that carries `player`.
    pub fn send(&self, player: &PlayerId, command: AgentCommand) -> Result<(), LinkError> {
        let table = self.table();
        let conn = *table
            .players
            .get(player)
            .ok_or_else(|| LinkError::NotLinked(player.clone()))?;
        let outbox = table.outboxes.get(&conn).ok_or(LinkError::Closed(conn))?;
        outbox.send(command).map_err(|_| LinkError::Closed(conn))
    }

    /// The connection currently carrying `player`, if any.
    pub fn connection_for(&self, player: &PlayerId) -> Option<ConnectionId> {
        self.table().players.get(player).copied()
    }

    /// Number of registered agent connections.
    pub fn connection_count(&self) -> usize {
        self.table().outboxes.len()
    }
}
