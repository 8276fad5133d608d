//! Pipeline controller.
//!
//! Owns one live session, the sampler feed, and the dispatch task, with an
//! explicit start/stop lifecycle. Starting constructs a fresh session (a
//! failed one is never resurrected), and shutdown always runs all four
//! teardown steps: stop the capture cadence, release the device, detach
//! the session listeners, close the session.

use crate::camera::FrameSource;
use crate::dispatcher::Dispatcher;
use crate::gemini::LiveConfig;
use crate::integrator::{ParameterIntegrator, DEFAULT_SMOOTHING};
use crate::sampler::{self, SamplerConfig};
use crate::session::{LiveSession, SessionEvent};
use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub live: LiveConfig,
    pub sampler: SamplerConfig,
    pub smoothing: f64,
}

impl PipelineConfig {
    pub fn for_api_key(api_key: &str) -> Self {
        Self {
            live: LiveConfig::for_api_key(api_key),
            sampler: SamplerConfig::default(),
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

/// A running gesture-control pipeline. Dropping it without calling
/// [`Pipeline::shutdown`] leaks the background tasks; the entry point that
/// starts it owns the stop.
pub struct Pipeline {
    session: LiveSession,
    sampler_stop: watch::Sender<bool>,
    sampler_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
    status_rx: watch::Receiver<bool>,
    expansion_rx: watch::Receiver<f64>,
}

impl Pipeline {
    /// Start the whole pipeline: session handshake first, then the
    /// dispatch task and the sampler feed.
    pub async fn start(config: PipelineConfig, source: Box<dyn FrameSource>) -> Result<Self> {
        let mut session = LiveSession::new(config.live);
        session
            .connect_and_setup()
            .await
            .context("session handshake failed")?;

        let status_rx = session.status();
        let sender = session.sender()?;

        let integrator = ParameterIntegrator::new(config.smoothing);
        let expansion_rx = integrator.subscribe();
        let mut dispatcher = Dispatcher::new(integrator);

        let mut events = session
            .take_events()
            .ok_or_else(|| anyhow!("session event stream already taken"))?;
        let result_sender = sender.clone();
        let dispatch_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    Ok(SessionEvent::ToolCall(payload)) => {
                        for result in dispatcher.handle(&payload) {
                            if let Err(e) = result_sender.submit_tool_result(result).await {
                                warn!("tool result not delivered: {e}");
                            }
                        }
                    }
                    Ok(SessionEvent::ToolCallCancellation(payload)) => {
                        // State is overwritten by every new invocation, so
                        // there is nothing to roll back.
                        debug!("ignoring tool-call cancellation: {payload}");
                    }
                    Ok(SessionEvent::GoAway) => {
                        info!("peer signalled imminent disconnect");
                    }
                    Ok(SessionEvent::SetupComplete) => {}
                    Err(e) => {
                        error!("session failed: {e}");
                        break;
                    }
                }
            }
            debug!("dispatch task finished");
        });

        let (sampler_stop, stop_rx) = watch::channel(false);
        let sampler_task = sampler::spawn(source, sender, config.sampler, stop_rx);

        info!("pipeline started");
        Ok(Self {
            session,
            sampler_stop,
            sampler_task,
            dispatch_task,
            status_rx,
            expansion_rx,
        })
    }

    /// Outward connection indicator; `true` exactly while the session is
    /// open, transitions delivered in order.
    pub fn connection_status(&self) -> watch::Receiver<bool> {
        self.status_rx.clone()
    }

    /// Smoothed expansion value for the render loop, always in [0, 1].
    pub fn expansion(&self) -> watch::Receiver<f64> {
        self.expansion_rx.clone()
    }

    /// Tear the pipeline down. Every step is attempted even if an earlier
    /// one fails.
    pub async fn shutdown(mut self) {
        // Stop the capture cadence; the sampler releases the device on its
        // way out.
        if self.sampler_stop.send(true).is_err() {
            debug!("sampler already stopped");
        }
        if let Err(e) = (&mut self.sampler_task).await {
            warn!("sampler task did not exit cleanly: {e}");
        }

        // Detach the session listeners.
        self.dispatch_task.abort();

        // Close the session last so in-flight submissions drain as drops.
        self.session.close().await;
        info!("pipeline shut down");
    }
}
