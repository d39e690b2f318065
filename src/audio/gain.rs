use std::sync::atomic::{AtomicU32, Ordering};

use crate::audio::GainControl;

/// Lowest master gain, effectively silence
pub const MIN_GAIN_DB: f32 = -80.0;
/// Highest master gain (+6 dB, double amplitude)
pub const MAX_GAIN_DB: f32 = 6.0206;

/// Master gain shared between a line's writer and its audio callback
#[derive(Debug)]
pub struct MasterGain {
    db: AtomicU32, // f32 bits for atomic access
    min: f32,
    max: f32,
}

impl MasterGain {
    pub fn new() -> Self {
        Self::with_range(MIN_GAIN_DB, MAX_GAIN_DB)
    }

    pub fn with_range(min: f32, max: f32) -> Self {
        Self {
            db: AtomicU32::new(0.0f32.to_bits()),
            min,
            max,
        }
    }

    /// Amplitude factor for the current gain
    pub fn linear(&self) -> f32 {
        let db = self.value();
        if db <= self.min {
            0.0
        } else {
            10f32.powf(db / 20.0)
        }
    }
}

impl Default for MasterGain {
    fn default() -> Self {
        Self::new()
    }
}

impl GainControl for MasterGain {
    fn value(&self) -> f32 {
        f32::from_bits(self.db.load(Ordering::Relaxed))
    }

    fn set_value(&self, db: f32) {
        let clamped = if db.is_nan() { 0.0 } else { db.clamp(self.min, self.max) };
        self.db.store(clamped.to_bits(), Ordering::Relaxed);
    }

    fn minimum(&self) -> f32 {
        self.min
    }

    fn maximum(&self) -> f32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unity() {
        let gain = MasterGain::new();
        assert_eq!(gain.value(), 0.0);
        assert!((gain.linear() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gain_clamping() {
        let gain = MasterGain::new();
        gain.set_value(20.0);
        assert_eq!(gain.value(), MAX_GAIN_DB);
        gain.set_value(-200.0);
        assert_eq!(gain.value(), MIN_GAIN_DB);
        assert_eq!(gain.linear(), 0.0);
        gain.set_value(f32::NAN);
        assert_eq!(gain.value(), 0.0);
    }

    #[test]
    fn test_linear_conversion() {
        let gain = MasterGain::new();
        gain.set_value(-6.0206);
        assert!((gain.linear() - 0.5).abs() < 1e-3);
        gain.set_value(MAX_GAIN_DB);
        assert!((gain.linear() - 2.0).abs() < 1e-3);
    }
}
