//! Conversion between wall-clock seconds and a model's dimensionless time.

use cf_core::{CoreError, CoreResult};

/// Seconds per dimensionless time unit of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timescale {
    seconds: f64,
}

impl Timescale {
    /// Create a timescale; τ must be finite and strictly positive.
    pub fn new(seconds: f64) -> CoreResult<Self> {
        if !seconds.is_finite() {
            return Err(CoreError::NonFinite {
                what: "timescale",
                value: seconds,
            });
        }
        if seconds <= 0.0 {
            return Err(CoreError::InvalidArg {
                what: "timescale must be positive",
            });
        }
        Ok(Self { seconds })
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    #[inline]
    pub fn to_dimensionless(&self, seconds: f64) -> f64 {
        seconds / self.seconds
    }

    #[inline]
    pub fn to_seconds(&self, dimensionless: f64) -> f64 {
        dimensionless * self.seconds
    }
}
