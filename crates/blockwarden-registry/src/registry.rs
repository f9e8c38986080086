//! The player registry: last-known state per player.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is NOT thread-safe by itself: it's a plain
//! `HashMap`. [`LiveRegistry`](crate::LiveRegistry) wraps it in a lock and
//! is what the ingress and HTTP handlers share.

use std::collections::HashMap;
use std::time::Instant;

use blockwarden_protocol::{PlayerId, PlayerState};

use crate::{EvictionPolicy, RegistryConfig};

/// A registry entry: the reported state plus when it arrived.
#[derive(Debug, Clone)]
struct Entry {
    state: PlayerState,
    updated_at: Instant,
}

/// Maps player identifiers to their most recent reported state.
///
/// ## Lifecycle of an entry
///
/// ```text
/// update() ──→ [present] ──update()──→ [present, replaced]
///                  │
///                  ├── OnDisconnect: evict_disconnected() ──→ removed
///                  ├── Ttl:          expire_stale()       ──→ removed
///                  └── Retain:       stays until restart
/// ```
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    entries: HashMap<PlayerId, Entry>,
    config: RegistryConfig,
}

impl PlayerRegistry {
    /// Creates an empty registry with the given config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Stores `state` as the current state of `state.uuid`, replacing any
    /// previous entry as a whole. Never fails and does no validation.
    pub fn update(&mut self, state: PlayerState) {
        self.update_at(state, Instant::now());
    }

    /// [`update`](Self::update) with an explicit arrival time.
    pub fn update_at(&mut self, state: PlayerState, now: Instant) {
        let player = state.uuid.clone();
        let previous = self.entries.insert(
            player.clone(),
            Entry {
                state,
                updated_at: now,
            },
        );
        if previous.is_none() {
            tracing::debug!(%player, "player added to registry");
        }
    }

    /// Returns a snapshot of every entry, in no particular order.
    pub fn list_all(&self) -> Vec<PlayerState> {
        self.entries.values().map(|e| e.state.clone()).collect()
    }

    /// Looks up one player's state.
    pub fn get(&self, player: &PlayerId) -> Option<&PlayerState> {
        self.entries.get(player).map(|e| &e.state)
    }

    /// Removes a player. Returns the removed state, if any.
    pub fn remove(&mut self, player: &PlayerId) -> Option<PlayerState> {
        self.entries.remove(player).map(|e| e.state)
    }

    /// Applies the disconnect half of the eviction policy.
    ///
    /// `players` are the identifiers a just-closed agent connection had
    /// reported. Under [`EvictionPolicy::OnDisconnect`] they are removed;
    /// under any other policy nothing happens.
    ///
    /// Returns the identifiers that were actually removed.
    pub fn evict_disconnected(&mut self, players: &[PlayerId]) -> Vec<PlayerId> {
        if !self.config.eviction.evicts_on_disconnect() {
            return Vec::new();
        }
        players
            .iter()
            .filter(|p| self.entries.remove(*p).is_some())
            .cloned()
            .collect()
    }

    /// Removes entries older than the configured TTL.
    ///
    /// No-op unless the policy is [`EvictionPolicy::Ttl`]. Returns the
    /// identifiers that were removed.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        self.expire_stale_at(Instant::now())
    }

    /// [`expire_stale`](Self::expire_stale) measured against `now`.
    pub fn expire_stale_at(&mut self, now: Instant) -> Vec<PlayerId> {
        let Some(ttl) = self.config.eviction.ttl() else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        self.entries.retain(|player, entry| {
            let fresh = now.saturating_duration_since(entry.updated_at) < ttl;
            if !fresh {
                expired.push(player.clone());
            }
            fresh
        });

        for player in &expired {
            tracing::info!(%player, "player expired from registry (ttl)");
        }
        expired
    }

    /// Returns the active eviction policy.
    pub fn eviction(&self) -> EvictionPolicy {
        self.config.eviction
    }

    /// Returns the number of players in the registry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no player has been reported (or all were evicted).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
