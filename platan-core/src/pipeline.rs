//! End-to-end audio flows: capture → encode → upload, and check →
//! download → decode → playback.
//!
//! The engine stays transfer-only; this module owns the codec state
//! discipline (fresh state per chunk, so every chunk is a self-contained
//! stream) and the double-buffered playback handoff.

use crate::codec::{self, CodecState};
use crate::engine::{EngineError, TransferEngine};
use crate::gain;
use crate::transport::{NetworkLink, Transport};

/// Raw audio capture source. `fill` blocks until the buffer is full;
/// returns false when capture failed.
pub trait CaptureSource {
    fn fill(&mut self, buf: &mut [i16]) -> bool;
}

/// Raw audio playback sink. `drain` hands a buffer to the hardware and
/// returns immediately; `is_draining` reports whether the previous buffer
/// is still playing.
pub trait PlaybackSink {
    fn drain(&mut self, buf: &[i16]) -> bool;
    fn is_draining(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("artifact not ready: {0}")]
    NotReady(String),
    #[error("audio capture failed")]
    Capture,
    #[error("audio playback failed")]
    Playback,
}

/// Record `samples` samples, optionally peak-normalize, encode, upload.
/// Returns the server-assigned artifact name.
pub fn capture_and_upload<T: Transport, L: NetworkLink, S: CaptureSource>(
    engine: &mut TransferEngine<T, L>,
    source: &mut S,
    samples: usize,
    normalize: bool,
) -> Result<String, PipelineError> {
    let mut pcm = vec![0i16; samples];
    if !source.fill(&mut pcm) {
        return Err(PipelineError::Capture);
    }
    if normalize {
        pcm = gain::normalize_peak(&pcm, gain::DEFAULT_HEADROOM);
    }
    let encoded = codec::encode(&pcm);
    Ok(engine.upload(&encoded)?)
}

/// Check once and download every chunk, decoding each with a fresh codec
/// state. Returns the full decoded PCM. `NotReady` when the server has
/// not materialized the artifact yet; callers retry with their own delay.
pub fn fetch_artifact<T: Transport, L: NetworkLink>(
    engine: &mut TransferEngine<T, L>,
    name: &str,
) -> Result<Vec<i16>, PipelineError> {
    let report = engine.check(name)?;
    if !report.is_ready() {
        return Err(PipelineError::NotReady(report.status));
    }
    let mut pcm = Vec::with_capacity(codec::decoded_len(report.size as usize));
    for i in 0..report.chunks {
        let chunk = engine.download(name, i)?;
        let mut state = CodecState::new();
        for &byte in &chunk {
            pcm.push(state.decode_nibble(byte >> 4));
            pcm.push(state.decode_nibble(byte & 0x0F));
        }
    }
    Ok(pcm)
}

/// Stream an artifact to a playback sink with two alternating decode
/// buffers: decode into one while the other drains, busy-polling the sink
/// before reusing a slot.
pub fn play_artifact<T: Transport, L: NetworkLink, P: PlaybackSink>(
    engine: &mut TransferEngine<T, L>,
    name: &str,
    sink: &mut P,
) -> Result<(), PipelineError> {
    let report = engine.check(name)?;
    if !report.is_ready() {
        return Err(PipelineError::NotReady(report.status));
    }
    // Each compressed byte expands to two samples.
    let buf_samples = codec::decoded_len(report.chunksize as usize);
    let mut buffers = [vec![0i16; buf_samples], vec![0i16; buf_samples]];
    for i in 0..report.chunks {
        let chunk = engine.download(name, i)?;
        let slot = &mut buffers[(i % 2) as usize];
        let n = codec::decode_into(&chunk, slot)
            .map_err(|_| PipelineError::Playback)?;
        while sink.is_draining() {
            // Hardware still playing the other buffer.
            std::hint::spin_loop();
        }
        if !sink.drain(&slot[..n]) {
            return Err(PipelineError::Playback);
        }
    }
    Ok(())
}
