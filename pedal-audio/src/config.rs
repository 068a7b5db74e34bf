//! Construction-time settings for the pipeline

#[derive(Debug, Clone, PartialEq)]
pub struct PedalConfig {
    pub sample_rate: f32,
    /// Looper capacity in seconds
    pub max_looper_seconds: f32,
    pub input_gain: f32,
    pub output_level: f32,
    pub looper_mix: f32,
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_looper_seconds: 60.0,
            input_gain: 0.3,
            output_level: 1.0,
            looper_mix: 1.0,
        }
    }
}

impl PedalConfig {
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn looper_samples(&self) -> usize {
        (self.sample_rate * self.max_looper_seconds).max(1.0) as usize
    }
}
