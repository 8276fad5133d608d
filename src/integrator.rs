//! Control-value integration.
//!
//! Folds raw expansion observations into the smoothed parameter the render
//! loop reads. Smoothing lives here and only here: consumers get a value
//! that is already clamped to [0, 1] and moves a bounded step per
//! observation, however sparse or noisy the peer's updates are.

use tokio::sync::watch;

/// Mid-range starting value, shown before the peer has said anything.
pub const DEFAULT_EXPANSION: f64 = 0.5;

/// Fraction of the gap to the newest observation covered per update.
pub const DEFAULT_SMOOTHING: f64 = 0.35;

pub struct ParameterIntegrator {
    smoothing: f64,
    last_raw: Option<f64>,
    tx: watch::Sender<f64>,
}

impl ParameterIntegrator {
    pub fn new(smoothing: f64) -> Self {
        let (tx, _) = watch::channel(DEFAULT_EXPANSION);
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            last_raw: None,
            tx,
        }
    }

    /// Fold one raw observation into the smoothed value.
    pub fn observe(&mut self, raw: f64) {
        if !raw.is_finite() {
            return;
        }
        let clamped = raw.clamp(0.0, 1.0);
        self.last_raw = Some(clamped);
        let smoothing = self.smoothing;
        self.tx.send_modify(|smoothed| {
            *smoothed += (clamped - *smoothed) * smoothing;
            *smoothed = smoothed.clamp(0.0, 1.0);
        });
    }

    /// Current smoothed value.
    pub fn value(&self) -> f64 {
        *self.tx.borrow()
    }

    /// Most recent raw observation, if any.
    pub fn last_raw(&self) -> Option<f64> {
        self.last_raw
    }

    /// Receiver for the render loop; updated on every observation.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }
}

impl Default for ParameterIntegrator {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}
