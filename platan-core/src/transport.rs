//! Injected I/O seams: the engine itself performs no network or radio I/O.

use serde_json::Value;

use crate::protocol::Endpoint;

/// Synchronous JSON-over-POST transport. One outstanding request at a
/// time; blocks until a response or failure. Implementations map a
/// non-200 status to `TransportError::Status` and never retry.
pub trait Transport {
    fn post(&mut self, endpoint: Endpoint, body: &Value) -> Result<Value, TransportError>;
}

/// Network association (Wi-Fi on the device, a no-op on hosts where the
/// OS owns the link).
pub trait NetworkLink {
    fn up(&mut self) -> Result<(), TransportError>;
    fn down(&mut self);
}

/// No-op link for environments where the network is already up.
#[derive(Debug, Default)]
pub struct AlwaysUp;

impl NetworkLink for AlwaysUp {
    fn up(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn down(&mut self) {}
}

/// Non-200 status or a failure below HTTP.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("server returned status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}
