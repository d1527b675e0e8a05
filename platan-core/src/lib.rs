//! Platan sensor protocol reference implementation.
//! Host-driven: no I/O; the host injects a transport and network link.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod gain;
pub mod pipeline;
pub mod protocol;
pub mod transport;

pub use codec::{CodecContractError, CodecState};
pub use config::{ConfigError, CredentialStore, DeviceConfig};
pub use engine::{ConnState, EngineError, TransferEngine};
pub use pipeline::{CaptureSource, PipelineError, PlaybackSink};
pub use protocol::{CheckReport, Command, Endpoint, ProtocolError};
pub use transport::{AlwaysUp, NetworkLink, Transport, TransportError};
