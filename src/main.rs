//! gesturelive - camera-gesture control for a particle visual
//!
//! Streams webcam frames to a Gemini Live session and turns the model's
//! `updateParticleState` tool calls into a smoothed expansion parameter
//! for the particle render loop.

#![forbid(unsafe_code)]

/// Webcam capture and frame encoding
pub mod camera;
/// Tool-call recognition and acknowledgement
pub mod dispatcher;
/// Live API wire protocol and configuration
pub mod gemini;
/// Particle shape generation
pub mod geometry;
/// Raw-to-smoothed control value integration
pub mod integrator;
/// Pipeline lifecycle controller
pub mod pipeline;
/// Fixed-cadence frame sampling
pub mod sampler;
/// Live session channel
pub mod session;

#[cfg(test)]
mod testutil;

use anyhow::{Context, Result};
use pipeline::{Pipeline, PipelineConfig};
use tracing::info;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const PARTICLE_COUNT: usize = 5000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    info!("starting gesturelive");

    // Both preconditions are fatal: without a credential or a camera the
    // pipeline stays down, reported once.
    let api_key = std::env::var("GEMINI_API_KEY")
        .context("GEMINI_API_KEY is not set; cannot start the control session")?;
    let source = camera::CameraSource::open(CAPTURE_WIDTH, CAPTURE_HEIGHT)
        .context("no usable capture device")?;

    let config = PipelineConfig::for_api_key(&api_key);
    let pipeline = Pipeline::start(config, Box::new(source)).await?;

    let shape = geometry::ShapeType::Heart;
    let particles = geometry::generate_particles(shape, PARTICLE_COUNT);
    info!("generated {} particles for {}", particles.len(), shape.name());

    // Stand-in for the render loop: log status flips and expansion updates.
    let mut status = pipeline.connection_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let connected = *status.borrow();
            info!(
                "connection status: {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
    });
    let mut expansion = pipeline.expansion();
    tokio::spawn(async move {
        while expansion.changed().await.is_ok() {
            let value = *expansion.borrow();
            info!("expansion -> {:.3}", value);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    pipeline.shutdown().await;

    Ok(())
}
