//! Output peak meter

/// Block peak follower: instant attack, exponential fall per block
#[derive(Debug, Clone, Copy)]
pub struct PeakMeter {
    peak: f32,
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakMeter {
    /// Per-block decay multiplier
    pub const DECAY: f32 = 0.995;
    /// Display floor in dB
    pub const FLOOR_DB: f32 = -60.0;
    /// Display ceiling in dB
    pub const CEILING_DB: f32 = 6.0;

    pub fn new() -> Self {
        Self { peak: 0.0 }
    }

    /// Feed the absolute peak of one block
    #[inline]
    pub fn update(&mut self, block_peak: f32) {
        if block_peak > self.peak {
            self.peak = block_peak;
        } else {
            self.peak *= Self::DECAY;
        }
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn level_db(&self) -> f32 {
        if self.peak < 0.001 {
            return Self::FLOOR_DB;
        }
        (20.0 * self.peak.log10()).clamp(Self::FLOOR_DB, Self::CEILING_DB)
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_attack_slow_decay() {
        let mut m = PeakMeter::new();
        m.update(0.8);
        assert_eq!(m.peak(), 0.8);
        m.update(0.1);
        assert!((m.peak() - 0.8 * 0.995).abs() < 1e-6);
    }

    #[test]
    fn test_level_db_bounds() {
        let mut m = PeakMeter::new();
        assert_eq!(m.level_db(), -60.0);
        m.update(1.0);
        assert!(m.level_db().abs() < 1e-4, "0 dBFS expected, got {}", m.level_db());
        m.update(4.0);
        assert_eq!(m.level_db(), 6.0);
    }
}
