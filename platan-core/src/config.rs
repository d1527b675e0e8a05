//! Device identity configuration: built once at startup and handed to the
//! engine, never ambient process state.

/// Persistent key-value credential store (NVS on the device, a config file
/// on a host). Absent keys return `None`.
pub trait CredentialStore {
    fn get(&self, name: &str) -> Option<Vec<u8>>;
}

/// Device identity: opaque stable ID plus the shared key, both provisioned
/// out-of-band. The key never leaves the process.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_id: String,
    pub shared_key: Vec<u8>,
}

impl DeviceConfig {
    /// Build from an ID and the hex-encoded key as provisioned.
    pub fn from_hex_key(device_id: impl Into<String>, hex_key: &str) -> Result<Self, ConfigError> {
        let shared_key = hex::decode(hex_key).map_err(|_| ConfigError::InvalidKey)?;
        Ok(Self {
            device_id: device_id.into(),
            shared_key,
        })
    }

    /// Load from a credential store. Keys `deviceId` and `deviceKey`, the
    /// key stored as a hex string.
    pub fn from_store<S: CredentialStore>(store: &S) -> Result<Self, ConfigError> {
        let id = store
            .get("deviceId")
            .ok_or(ConfigError::Missing("deviceId"))?;
        let key = store
            .get("deviceKey")
            .ok_or(ConfigError::Missing("deviceKey"))?;
        let device_id =
            String::from_utf8(id).map_err(|_| ConfigError::Invalid("deviceId"))?;
        let hex_key = String::from_utf8(key).map_err(|_| ConfigError::Invalid("deviceKey"))?;
        Self::from_hex_key(device_id, &hex_key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential `{0}`")]
    Missing(&'static str),
    #[error("credential `{0}` is not valid UTF-8")]
    Invalid(&'static str),
    #[error("device key is not valid hex")]
    InvalidKey,
}
