//! Registry configuration: what happens to entries nobody updates anymore.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// EvictionPolicy
// ---------------------------------------------------------------------------

/// When a player's last-known state is dropped from the registry.
///
/// The agent never sends an explicit "player left" message, so the
/// registry can't know whether an entry is still live. The operator picks
/// the trade-off:
///
/// - **Retain**: keep the last known state until the same player is
///   reported again. Players who logged off stay visible at their last
///   position.
/// - **OnDisconnect**: when an agent connection closes, drop every player
///   that connection reported.
/// - **Ttl**: drop players whose state hasn't been refreshed for the
///   given duration. The agent reports every tick, so a short TTL tracks
///   logouts closely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    #[default]
    Retain,
    OnDisconnect,
    Ttl(Duration),
}

impl EvictionPolicy {
    /// Returns the TTL if this policy expires entries by age.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Ttl(ttl) => Some(*ttl),
            _ => None,
        }
    }

    /// Returns `true` if entries are dropped when their agent disconnects.
    pub fn evicts_on_disconnect(&self) -> bool {
        matches!(self, Self::OnDisconnect)
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retain => write!(f, "retain"),
            Self::OnDisconnect => write!(f, "on-disconnect"),
            Self::Ttl(ttl) => write!(f, "ttl({}s)", ttl.as_secs()),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for the live player registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// How stale entries are removed. Default: [`EvictionPolicy::Retain`].
    pub eviction: EvictionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_policy_default_is_retain() {
        assert_eq!(RegistryConfig::default().eviction, EvictionPolicy::Retain);
    }

    #[test]
    fn test_eviction_policy_ttl_accessor() {
        let policy = EvictionPolicy::Ttl(Duration::from_secs(30));
        assert_eq!(policy.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(EvictionPolicy::Retain.ttl(), None);
    }

    #[test]
    fn test_eviction_policy_display() {
        assert_eq!(EvictionPolicy::OnDisconnect.to_string(), "on-disconnect");
        assert_eq!(
            EvictionPolicy::Ttl(Duration::from_secs(300)).to_string(),
            "ttl(300s)"
        );
    }
}
