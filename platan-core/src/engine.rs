//! Transfer engine: one authenticated session to the store-and-retrieve
//! service, with an explicit connection state machine.
//!
//! The engine issues one synchronous request at a time and never retries;
//! polling loops (check until ready, re-join after a demotion) belong to
//! the caller. One engine instance per device; concurrent calls from
//! multiple contexts are out of contract.

use std::path::Path;

use serde_json::Value;

use crate::config::DeviceConfig;
use crate::crypto;
use crate::protocol::{
    self, CheckReport, Command, ProtocolError,
};
use crate::transport::{NetworkLink, Transport, TransportError};

/// Connection status. `Joining` is the window between receiving a
/// challenge and sending its response; it exists so the two-phase
/// handshake is an explicit two-step transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Offline,
    Online,
    Joining,
    Connected,
}

/// Engine failure taxonomy. `State` is a caller contract violation; the
/// others describe what the wire did.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("operation `{op}` not valid in state {state:?}")]
    State { op: &'static str, state: ConnState },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authenticated chunked-transfer client. Generic over the injected
/// transport and network link; owns session and token exclusively.
pub struct TransferEngine<T: Transport, L: NetworkLink> {
    config: DeviceConfig,
    transport: T,
    link: L,
    state: ConnState,
    session: Option<String>,
    token: Option<String>,
}

impl<T: Transport, L: NetworkLink> TransferEngine<T, L> {
    pub fn new(config: DeviceConfig, transport: T, link: L) -> Self {
        Self {
            config,
            transport,
            link,
            state: ConnState::Offline,
            session: None,
            token: None,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    /// The only code path that mutates state, session and token together.
    /// Leaving the authenticated path (to `Online` or `Offline`) always
    /// drops both.
    fn transition(&mut self, to: ConnState) {
        match to {
            ConnState::Offline | ConnState::Online => {
                self.session = None;
                self.token = None;
            }
            ConnState::Joining | ConnState::Connected => {}
        }
        self.state = to;
    }

    /// Demote to `Online` after a failed authenticated request, forcing a
    /// re-join, and pass the error through.
    fn demote<E: Into<EngineError>>(&mut self, err: E) -> EngineError {
        self.transition(ConnState::Online);
        err.into()
    }

    fn send(&mut self, cmd: &Command<'_>) -> Result<Value, TransportError> {
        let body = serde_json::to_value(cmd).map_err(|e| TransportError::Network(e.to_string()))?;
        self.transport.post(cmd.endpoint(), &body)
    }

    fn require_connected(&self, op: &'static str) -> Result<(), EngineError> {
        if self.state != ConnState::Connected {
            return Err(EngineError::State {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Bring the network link up. Idempotent once past `Offline`.
    pub fn connect(&mut self) -> Result<(), EngineError> {
        if self.state != ConnState::Offline {
            return Ok(());
        }
        self.link.up()?;
        self.transition(ConnState::Online);
        Ok(())
    }

    /// Drop session, token and the network association. No-op when
    /// already offline.
    pub fn disconnect(&mut self) {
        if self.state == ConnState::Offline {
            return;
        }
        self.link.down();
        self.transition(ConnState::Offline);
    }

    /// Two-phase challenge-response handshake. Only valid in `Online`;
    /// every failure path lands back in `Online` with session and token
    /// cleared.
    pub fn join(&mut self) -> Result<(), EngineError> {
        if self.state != ConnState::Online {
            return Err(EngineError::State {
                op: "join",
                state: self.state,
            });
        }

        // Phase 1: request a challenge.
        let id = self.config.device_id.clone();
        let reply = self.send(&Command::Join { id: &id })?;
        let jc = protocol::parse_join(&reply)?;
        self.session = Some(jc.session.clone());
        self.transition(ConnState::Joining);

        // Phase 2: prove key possession by encrypting the challenge.
        let response =
            match crypto::encrypt_challenge(&self.config.shared_key, &jc.iv, &jc.challenge) {
                Ok(ct) => ct,
                Err(e) => {
                    return Err(self.demote(EngineError::Auth(format!(
                        "challenge encryption failed: {e}"
                    ))))
                }
            };
        let cmd = Command::Challenge {
            id: &id,
            challenge: hex::encode(response),
            session: &jc.session,
        };
        let reply = match self.send(&cmd) {
            Ok(v) => v,
            Err(TransportError::Status(code)) => {
                return Err(self.demote(EngineError::Auth(format!(
                    "challenge rejected with status {code}"
                ))))
            }
            Err(e) => return Err(self.demote(e)),
        };
        let token = match protocol::parse_token(&reply) {
            Ok(t) => t,
            Err(_) => {
                return Err(self.demote(EngineError::Auth(
                    "no token in challenge response".into(),
                )))
            }
        };
        self.token = Some(token);
        self.transition(ConnState::Connected);
        Ok(())
    }

    /// Upload a payload; returns the server-assigned artifact name.
    pub fn upload(&mut self, payload: &[u8]) -> Result<String, EngineError> {
        self.require_connected("upload")?;
        let id = self.config.device_id.clone();
        let token = self.token.clone().unwrap_or_default();
        let cmd = Command::Data {
            id: &id,
            token: &token,
            data: protocol::encode_payload(payload),
        };
        let reply = match self.send(&cmd) {
            Ok(v) => v,
            Err(e) => return Err(self.demote(e)),
        };
        protocol::parse_upload(&reply).map_err(|e| self.demote(e))
    }

    /// Upload a file's contents. Statically distinct from [`upload`]; the
    /// state check runs before the file is touched.
    ///
    /// [`upload`]: Self::upload
    pub fn upload_file(&mut self, path: &Path) -> Result<String, EngineError> {
        self.require_connected("upload_file")?;
        let bytes = std::fs::read(path)?;
        self.upload(&bytes)
    }

    /// Ask whether an artifact is materialized and how it is chunked.
    /// Callers poll this until `is_ready()`.
    pub fn check(&mut self, name: &str) -> Result<CheckReport, EngineError> {
        self.require_connected("check")?;
        let id = self.config.device_id.clone();
        let token = self.token.clone().unwrap_or_default();
        let cmd = Command::Check {
            id: &id,
            token: &token,
            name,
        };
        let reply = match self.send(&cmd) {
            Ok(v) => v,
            Err(e) => return Err(self.demote(e)),
        };
        protocol::parse_check(&reply).map_err(|e| self.demote(e))
    }

    /// Fetch one chunk by index in `[0, chunks)`. Each chunk is a
    /// self-contained stream for the codec.
    pub fn download(&mut self, name: &str, chunk: u32) -> Result<Vec<u8>, EngineError> {
        self.require_connected("download")?;
        let id = self.config.device_id.clone();
        let token = self.token.clone().unwrap_or_default();
        let cmd = Command::Down {
            id: &id,
            token: &token,
            name,
            chunk,
        };
        let reply = match self.send(&cmd) {
            Ok(v) => v,
            Err(e) => return Err(self.demote(e)),
        };
        let payload = protocol::parse_chunk(&reply).map_err(|e| self.demote(e))?;
        Ok(payload.data)
    }
}
