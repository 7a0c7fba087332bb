//! Authentication hook and the device-id authenticator.
//!
//! The server never decides who a player is by itself. During the
//! handshake it hands the client's token to an [`Authenticator`] and
//! trusts the returned [`PlayerId`].

use std::collections::HashMap;
use std::sync::Mutex;

use crossmark_protocol::PlayerId;
use rand::Rng;

use crate::SessionError;

/// Validates a client's token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use crossmark_session::{Authenticator, SessionError};
/// use crossmark_protocol::PlayerId;
///
/// struct NumericAuthenticator;
///
/// impl Authenticator for NumericAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
///         Ok(PlayerId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the player's identity, or
    /// [`SessionError::AuthFailed`].
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}

/// A registered device and the profile created for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAccount {
    pub player_id: PlayerId,
    pub username: String,
}

/// Device-id authentication: the token is an opaque device identifier.
///
/// The first time a device is seen it gets a fresh random player id and a
/// default username built from the first eight characters of the device id.
/// Later handshakes from the same device resolve to the same player.
#[derive(Debug, Default)]
pub struct DeviceAuthenticator {
    devices: Mutex<HashMap<String, DeviceAccount>>,
}

impl DeviceAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the account registered for `device_id`, if any.
    pub fn account(&self, device_id: &str) -> Option<DeviceAccount> {
        self.lock().get(device_id).cloned()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, device_id: &str) -> Result<DeviceAccount, SessionError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(SessionError::AuthFailed("device_id is required".into()));
        }

        let mut devices = self.lock();
        if let Some(account) = devices.get(device_id) {
            return Ok(account.clone());
        }

        let player_id = loop {
            let candidate = PlayerId(rand::rng().random_range(1..=PlayerId::MAX_EXACT));
            if devices.values().all(|a| a.player_id != candidate) {
                break candidate;
            }
        };
        let prefix: String = device_id.chars().take(8).collect();
        let account = DeviceAccount {
            player_id,
            username: format!("Player_{prefix}"),
        };

        tracing::info!(%player_id, username = %account.username, "registered new device");
        devices.insert(device_id.to_string(), account.clone());
        Ok(account)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DeviceAccount>> {
        // A poisoned map is still structurally valid.
        self.devices.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Authenticator for DeviceAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        self.register(token).map(|account| account.player_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crossmark_protocol::{Symbol, SystemMessage};

    use super::*;

    #[tokio::test]
    async fn test_authenticate_empty_device_rejected() {
        let auth = DeviceAuthenticator::new();
        let err = auth.authenticate("").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(ref m) if m == "device_id is required"));

        let err = auth.authenticate("   ").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(_)));
        assert!(auth.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_same_device_same_player() {
        let auth = DeviceAuthenticator::new();
        let first = auth.authenticate("device-abc").await.unwrap();
        let second = auth.authenticate("device-abc").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(auth.len(), 1);
    }

    #[tokio::test]
    async fn test_authenticate_distinct_devices_distinct_players() {
        let auth = DeviceAuthenticator::new();
        let a = auth.authenticate("device-a").await.unwrap();
        let b = auth.authenticate("device-b").await.unwrap();
        assert_ne!(a, b);
        assert_ne!(a.0, 0);
        assert_ne!(b.0, 0);
    }

    #[tokio::test]
    async fn test_account_default_username_uses_device_prefix() {
        let auth = DeviceAuthenticator::new();
        let id = auth.authenticate("0123456789abcdef").await.unwrap();

        let account = auth.account("0123456789abcdef").unwrap();
        assert_eq!(account.player_id, id);
        assert_eq!(account.username, "Player_01234567");
    }

    #[tokio::test]
    async fn test_authenticate_ids_exact_as_json_numbers() {
        let auth = DeviceAuthenticator::new();
        for n in 0..64 {
            let id = auth.authenticate(&format!("device-{n}")).await.unwrap();
            assert!(id.0 <= PlayerId::MAX_EXACT);

            // HandshakeAck carries the id as a number...
            let ack = serde_json::to_value(SystemMessage::HandshakeAck {
                player_id: id,
                server_time: 0,
            })
            .unwrap();
            let parsed = ack["player_id"].as_f64().unwrap();
            assert_eq!(parsed as u64, id.0);

            // ...and STATE keys `players` by its decimal string.
            let players = serde_json::to_value(BTreeMap::from([(id, Symbol::X)])).unwrap();
            let key = players.as_object().unwrap().keys().next().unwrap().clone();
            assert_eq!(key.parse::<f64>().unwrap(), parsed);
            assert_eq!(key, id.0.to_string());
        }
    }

    #[test]
    fn test_account_unknown_device() {
        let auth = DeviceAuthenticator::new();
        assert!(auth.account("nobody").is_none());
    }
}
