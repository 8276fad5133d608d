//! Fixed-cadence frame sampling.
//!
//! Grabs a frame from the capture device on every tick, encodes it off the
//! loop, and hands it to the session channel fire-and-forget. Skipped
//! ticks (device warming up, session not open) are expected and cheap; a
//! failed tick never takes the loop down.

use crate::camera::{encode_frame, EncodeConfig, FrameSource};
use crate::session::SessionSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Capture cadence and encoding settings.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub frames_per_second: f64,
    pub encode: EncodeConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 2.0,
            encode: EncodeConfig::default(),
        }
    }
}

/// Start the sampling loop. The task owns the capture device and releases
/// it when `shutdown` fires or the channel behind it goes away.
pub fn spawn(
    mut source: Box<dyn FrameSource>,
    sender: SessionSender,
    config: SamplerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs_f64(1.0 / config.frames_per_second);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("sampler started at {:.1} fps", config.frames_per_second);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !sender.is_open() {
                        debug!("skipping tick: session not open");
                        continue;
                    }
                    let frame = match source.grab() {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            debug!("skipping tick: device not ready");
                            continue;
                        }
                        Err(e) => {
                            debug!("skipping tick: {e}");
                            continue;
                        }
                    };

                    // Encode and submit off the loop so a slow frame never
                    // delays the next tick; the next frame supersedes this
                    // one, so failures are logged and dropped.
                    let sender = sender.clone();
                    let encode = config.encode;
                    tokio::spawn(async move {
                        let jpeg = match tokio::task::spawn_blocking(move || {
                            encode_frame(&frame, encode)
                        })
                        .await
                        {
                            Ok(Ok(jpeg)) => jpeg,
                            Ok(Err(e)) => {
                                error!("frame encode failed: {e}");
                                return;
                            }
                            Err(e) => {
                                error!("encode task failed: {e}");
                                return;
                            }
                        };
                        if let Err(e) = sender.submit_media(&jpeg).await {
                            error!("frame submission failed: {e}");
                        }
                    });
                }
                _ = shutdown.changed() => break,
            }
        }

        source.release();
        info!("sampler stopped, capture device released");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LiveSession;
    use crate::testutil::{test_config, LocalLiveServer, TestFrames};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_sampler_submits_frames_while_open() {
        let server = LocalLiveServer::spawn().await;
        let mut session = LiveSession::new(test_config(&server.url));
        session.connect_and_setup().await.unwrap();

        let source = TestFrames::new();
        let grabs = source.grabs.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        let config = SamplerConfig {
            frames_per_second: 50.0,
            ..Default::default()
        };
        let handle = spawn(Box::new(source), session.sender().unwrap(), config, stop_rx);

        // setup + at least two frames
        let received = server.received_after(3).await;
        assert!(grabs.load(Ordering::SeqCst) >= 2);
        assert!(received[1]["realtimeInput"]["video"]["data"].is_string());

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        session.close().await;
    }

    #[tokio::test]
    async fn test_teardown_releases_device_and_stops_submissions() {
        let server = LocalLiveServer::spawn().await;
        let mut session = LiveSession::new(test_config(&server.url));
        session.connect_and_setup().await.unwrap();

        let source = TestFrames::new();
        let released = source.released.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        let config = SamplerConfig {
            frames_per_second: 50.0,
            ..Default::default()
        };
        let handle = spawn(Box::new(source), session.sender().unwrap(), config, stop_rx);

        server.received_after(2).await;

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(released.load(Ordering::SeqCst));

        session.close().await;
        let after_close = server.received_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.received_count(), after_close);
    }

    #[tokio::test]
    async fn test_not_ready_device_skips_without_error() {
        struct NeverReady;
        impl FrameSource for NeverReady {
            fn grab(&mut self) -> anyhow::Result<Option<crate::camera::RawFrame>> {
                Ok(None)
            }
            fn release(&mut self) {}
        }

        let server = LocalLiveServer::spawn().await;
        let mut session = LiveSession::new(test_config(&server.url));
        session.connect_and_setup().await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let config = SamplerConfig {
            frames_per_second: 100.0,
            ..Default::default()
        };
        let handle = spawn(
            Box::new(NeverReady),
            session.sender().unwrap(),
            config,
            stop_rx,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        // Only the setup message ever reached the peer.
        assert_eq!(server.received_count(), 1);
        session.close().await;
    }
}
