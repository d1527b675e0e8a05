// Platan agent: authenticated audio upload/fetch against the sensor store.

mod config;
mod transport;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use platan_core::pipeline::{self, PipelineError};
use platan_core::{codec, gain, ConnState, DeviceConfig, TransferEngine};

use transport::HttpTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay between check polls while the server materializes an artifact.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Give up fetching after this many failed rounds.
const MAX_POLL_ROUNDS: u32 = 30;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--version") | Some("-V") => {
            println!("platan-agent {VERSION}");
            Ok(())
        }
        Some("upload") if args.len() == 2 => upload(Path::new(&args[1])),
        Some("fetch") if args.len() == 3 => fetch(&args[1], Path::new(&args[2])),
        _ => {
            eprintln!("usage: platan-agent upload <raw-pcm-file>");
            eprintln!("       platan-agent fetch <name> <out-file>");
            eprintln!("       platan-agent --version");
            std::process::exit(2);
        }
    }
}

fn engine() -> Result<TransferEngine<HttpTransport, platan_core::AlwaysUp>> {
    let cfg = config::load();
    let device_id = cfg.device_id.context("device_id not configured")?;
    let device_key = cfg.device_key.context("device_key not configured")?;
    let upload_url = cfg.upload_url.context("upload_url not configured")?;
    let download_url = cfg.download_url.context("download_url not configured")?;

    let device = DeviceConfig::from_hex_key(device_id, &device_key)
        .context("invalid device credentials")?;
    let transport = HttpTransport::new(upload_url, download_url)
        .context("failed to build HTTP client")?;
    Ok(TransferEngine::new(device, transport, platan_core::AlwaysUp))
}

/// Read little-endian 16-bit PCM, normalize, ADPCM-encode and upload.
fn upload(path: &Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if raw.len() % 2 != 0 {
        bail!("{} is not 16-bit PCM (odd byte count)", path.display());
    }
    let pcm: Vec<i16> = raw
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    tracing::info!(samples = pcm.len(), "read recording");

    let pcm = gain::normalize_peak(&pcm, gain::DEFAULT_HEADROOM);
    let encoded = codec::encode(&pcm);
    tracing::info!(bytes = encoded.len(), "encoded");

    let mut engine = engine()?;
    engine.connect()?;
    engine.join()?;
    let name = engine.upload(&encoded)?;
    engine.disconnect();

    println!("{name}");
    Ok(())
}

/// Join, poll until the artifact is ready, download and decode every
/// chunk, write little-endian 16-bit PCM.
fn fetch(name: &str, out: &Path) -> Result<()> {
    let mut engine = engine()?;
    engine.connect()?;
    engine.join()?;

    let mut rounds = 0u32;
    let pcm = loop {
        match pipeline::fetch_artifact(&mut engine, name) {
            Ok(pcm) => break pcm,
            Err(PipelineError::NotReady(status)) => {
                tracing::info!(%status, "artifact not ready, retrying");
            }
            Err(PipelineError::Engine(e)) => {
                // Demoted: the engine dropped the session; join again.
                tracing::warn!(error = %e, "request failed, re-joining");
                if engine.state() != ConnState::Online {
                    engine.connect()?;
                }
                engine.join()?;
            }
            Err(e) => return Err(e.into()),
        }
        rounds += 1;
        if rounds >= MAX_POLL_ROUNDS {
            bail!("artifact `{name}` not ready after {MAX_POLL_ROUNDS} rounds");
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    engine.disconnect();

    let mut bytes = Vec::with_capacity(pcm.len() * 2);
    for s in &pcm {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    std::fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(samples = pcm.len(), path = %out.display(), "wrote decoded audio");
    Ok(())
}
