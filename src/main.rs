use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use voxlink::capture::{CapturePipeline, FileFrameSource, FrameSource};
use voxlink::playback::{play_file, SymphoniaDecoder, WavFileSink};
use voxlink::{Config, DuplexSession, WsTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/voxlink")?;

    info!("voxlink v{}", env!("CARGO_PKG_VERSION"));
    info!("Uplink server: {}", cfg.uplink.uri);

    let ca_cert = cfg.uplink.ca_cert.as_deref().map(Path::new);
    let transport = Arc::new(WsTransport::new(ca_cert)?);

    let session = Arc::new(DuplexSession::new(
        transport,
        cfg.uplink.reconnect_policy(),
        cfg.device.normalized_mac(),
    ));
    session.on_data(|bytes| {
        info!("Server sent {} bytes", bytes.len());
    });

    if let Some(prompt) = cfg.playback.prompt_file.clone() {
        tokio::task::spawn_blocking(move || {
            if let Err(e) = play_prompt(&prompt) {
                warn!("Prompt playback failed: {e:#}");
            }
        });
    }

    session
        .start(&cfg.uplink.uri)
        .await
        .context("Failed to start uplink session")?;

    let pipeline = match cfg.capture.source_file.as_deref() {
        Some(path) => {
            let source: Box<dyn FrameSource> =
                Box::new(FileFrameSource::new(path, cfg.capture.frame_size));
            Some(
                CapturePipeline::start(
                    source,
                    Arc::clone(&session),
                    cfg.capture.frame_size,
                    cfg.capture.recording_duration(),
                )
                .await?,
            )
        }
        None => {
            info!("No capture source configured, uplink only");
            None
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    if let Some(pipeline) = pipeline {
        pipeline.stop().await;
    }
    session.stop().await;

    Ok(())
}

/// Decode the configured prompt file next to itself as a .wav.
fn play_prompt(path: &str) -> Result<()> {
    let out = Path::new(path).with_extension("decoded.wav");

    let mut decoder = SymphoniaDecoder::new(path);
    let mut sink = WavFileSink::new(&out);
    let stats = play_file(&mut decoder, &mut sink)?;

    info!(
        "Decoded prompt {} -> {} ({} samples)",
        path,
        out.display(),
        stats.samples
    );

    Ok(())
}
