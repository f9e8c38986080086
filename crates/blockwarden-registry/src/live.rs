//! The shared registry handle.
//!
//! One `LiveRegistry` is built at startup and cloned into the agent ingress
//! and the HTTP state. Every operation takes the lock for a single map
//! operation and releases it before returning, so there is never an
//! `.await` while the lock is held and a reader can never see a
//! half-replaced record.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use blockwarden_protocol::{PlayerId, PlayerState};

use crate::{EvictionPolicy, PlayerRegistry, RegistryConfig};

/// Cheaply cloneable, thread-safe handle to a [`PlayerRegistry`].
#[derive(Debug, Clone, Default)]
pub struct LiveRegistry {
    inner: Arc<RwLock<PlayerRegistry>>,
}

impl LiveRegistry {
    /// Creates an empty registry with the given config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PlayerRegistry::new(config))),
        }
    }

    // A panicking writer can only have been interrupted between whole-map
    // operations, so the map is still consistent; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, PlayerRegistry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlayerRegistry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`PlayerRegistry::update`].
    pub fn update(&self, state: PlayerState) {
        self.write().update(state);
    }

    /// See [`PlayerRegistry::list_all`].
    pub fn list_all(&self) -> Vec<PlayerState> {
        self.read().list_all()
    }

    /// Returns a copy of one player's state.
    pub fn get(&self, player: &PlayerId) -> Option<PlayerState> {
        self.read().get(player).cloned()
    }

    /// See [`PlayerRegistry::remove`].
    pub fn remove(&self, player: &PlayerId) -> Option<PlayerState> {
        self.write().remove(player)
    }

    /// See [`PlayerRegistry::evict_disconnected`].
    pub fn evict_disconnected(&self, players: &[PlayerId]) -> Vec<PlayerId> {
        self.write().evict_disconnected(players)
    }

    /// See [`PlayerRegistry::expire_stale`].
    pub fn expire_stale(&self) -> Vec<PlayerId> {
        self.write().expire_stale()
    }

    pub fn eviction(&self) -> EvictionPolicy {
        self.read().eviction()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn state(uuid: &str, y: f64) -> PlayerState {
        PlayerState {
            uuid: PlayerId::from(uuid),
            name: format!("name-{uuid}"),
            x: y,
            y,
            z: y,
            inventory: vec![],
        }
    }

    #[test]
    fn test_clones_share_the_same_map() {
        let registry = LiveRegistry::default();
        let ingress_side = registry.clone();

        ingress_side.update(state("u1", 64.0));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&PlayerId::from("u1")).map(|s| s.y), Some(64.0));
    }

    #[test]
    fn test_concurrent_writers_never_tear_records() {
        // Many threads hammer the same identifier. Every record they
        // write has x == y == z, so a torn write would break the equality.
        let registry = LiveRegistry::default();
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        registry.update(state("shared", (t * 1000 + i) as f64));
                        registry.update(state(&format!("own-{t}"), i as f64));
                    }
                })
            })
            .collect();

        let reader = {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    for s in registry.list_all() {
                        assert!(s.x == s.y && s.y == s.z, "torn record: {s:?}");
                    }
                }
            })
        };

        for w in writers {
            w.join().expect("writer panicked");
        }
        reader.join().expect("reader panicked");

        // One shared entry plus one per writer thread.
        assert_eq!(registry.len(), 9);
    }

    #[tokio::test]
    async fn test_usable_from_async_tasks() {
        let registry = LiveRegistry::default();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.update(state(&format!("p{i}"), i as f64));
                })
            })
            .collect();
        for h in handles {
            h.await.expect("task");
        }

        assert_eq!(registry.list_all().len(), 4);
    }
}
