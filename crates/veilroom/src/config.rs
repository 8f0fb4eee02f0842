//! Relay configuration.

use serde::{Deserialize, Serialize};
use veilroom_room::KeyStrategy;

/// Which `message` contents the relay accepts and how it routes them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RelayMode {
    /// Plain text plus addressed and directed ciphertext.
    #[default]
    Addressed,
    /// Plain text only; any cipher content is rejected.
    Broadcast,
}

/// Behavior switches for the relay state machine.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```rust
/// use veilroom::{RelayConfig, RelayMode};
///
/// let config: RelayConfig =
///     serde_json::from_str(r#"{ "relay_mode": "broadcast" }"#).unwrap();
/// assert_eq!(config.relay_mode, RelayMode::Broadcast);
/// assert!(!config.require_public_key);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub relay_mode: RelayMode,
    pub key_strategy: KeyStrategy,
    /// Reject `username` without a public key.
    pub require_public_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_addressed_push_optional_key() {
        let config = RelayConfig::default();
        assert_eq!(config.relay_mode, RelayMode::Addressed);
        assert_eq!(config.key_strategy, KeyStrategy::Push);
        assert!(!config.require_public_key);
    }

    #[test]
    fn test_deserialize_empty_object_uses_defaults() {
        let config: RelayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_deserialize_all_fields() {
        let config: RelayConfig = serde_json::from_str(
            r#"{"relay_mode":"broadcast","key_strategy":"fan-out","require_public_key":true}"#,
        )
        .unwrap();
        assert_eq!(config.relay_mode, RelayMode::Broadcast);
        assert_eq!(config.key_strategy, KeyStrategy::FanOut);
        assert!(config.require_public_key);
    }
}
