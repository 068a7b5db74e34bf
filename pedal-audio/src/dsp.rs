//! DSP primitives shared by every stage of the pedal
//!
//! - Soft clippers (rational tanh approximation)
//! - One-pole smoothing / tone filters
//! - Fractional delay interpolators (linear, Thiran allpass, cubic)
//! - Triangle and sine LFOs
//! - Transposed direct-form II biquad with RBJ coefficient helpers

use std::f32::consts::PI;

/// Rational tanh approximation without the hard limit.
///
/// Exact for |x| small, saturates towards ±1 around |x| = 3 and
/// keeps growing slowly past that point.
#[inline]
pub fn soft_limit(x: f32) -> f32 {
    let x2 = x * x;
    x * (27.0 + x2) / (27.0 + 9.0 * x2)
}

/// Soft clipper: `soft_limit` inside ±3, hard ±1 outside.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if x > 3.0 {
        1.0
    } else if x < -3.0 {
        -1.0
    } else {
        soft_limit(x)
    }
}

/// Coefficient for a one-pole lowpass with the given cutoff
#[inline]
pub fn one_pole_coeff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    1.0 - (-2.0 * PI * cutoff_hz / sample_rate).exp()
}

/// Coefficient for an attack/release follower with a time constant in ms
#[inline]
pub fn time_coeff(ms: f32, sample_rate: f32) -> f32 {
    1.0 - (-1.0 / (ms / 1000.0 * sample_rate)).exp()
}

/// Convert decibels to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear gain to decibels (floored at -120 dB)
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 1e-6 {
        -120.0
    } else {
        20.0 * gain.log10()
    }
}

/// Map a normalized 0..1 value onto an exponential range
#[inline]
pub fn map_exp(n: f32, min: f32, max: f32) -> f32 {
    min * (max / min).powf(n.clamp(0.0, 1.0))
}

/// One-pole lowpass: `state += coeff * (input - state)`
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePole {
    state: f32,
}

impl OnePole {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, input: f32, coeff: f32) -> f32 {
        self.state += coeff * (input - self.state);
        self.state
    }

    pub fn value(&self) -> f32 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// Linear interpolation between two neighbouring samples
#[inline]
pub fn linear_interp(x0: f32, x1: f32, frac: f32) -> f32 {
    x0 + frac * (x1 - x0)
}

/// Cubic (Catmull-Rom Hermite) interpolation between `x0` and `x1`
#[inline]
pub fn cubic_interp(xm1: f32, x0: f32, x1: f32, x2: f32, t: f32) -> f32 {
    let c0 = x0;
    let c1 = 0.5 * (x1 - xm1);
    let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
    let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
    ((c3 * t + c2) * t + c1) * t + c0
}

/// First-order Thiran allpass fractional delay.
///
/// Holds one sample of output history. Used by the modulation
/// effects where a flat magnitude response matters more than
/// linear phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thiran {
    y_prev: f32,
}

impl Thiran {
    #[inline]
    pub fn process(&mut self, x0: f32, x1: f32, frac: f32) -> f32 {
        let a = (1.0 - frac) / (1.0 + frac);
        let y = -a * self.y_prev + x0 + a * x1;
        self.y_prev = y;
        y
    }

    pub fn reset(&mut self) {
        self.y_prev = 0.0;
    }
}

/// Unipolar triangle LFO (0..1) driven by a 0..1 phase accumulator
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangleLfo {
    phase: f32,
}

impl TriangleLfo {
    pub fn with_phase(phase: f32) -> Self {
        Self { phase: phase.rem_euclid(1.0) }
    }

    /// Current value in 0..1
    #[inline]
    pub fn value(&self) -> f32 {
        if self.phase < 0.5 {
            self.phase * 2.0
        } else {
            2.0 - self.phase * 2.0
        }
    }

    /// Advance by `inc` cycles
    #[inline]
    pub fn advance(&mut self, inc: f32) {
        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }
}

/// Sine LFO with a radian phase accumulator
#[derive(Debug, Clone, Copy, Default)]
pub struct SineLfo {
    phase: f32,
}

impl SineLfo {
    /// Unipolar value in 0..1
    #[inline]
    pub fn unipolar(&self) -> f32 {
        (self.phase.sin() + 1.0) * 0.5
    }

    #[inline]
    pub fn advance(&mut self, rate_hz: f32, sample_rate: f32) {
        self.phase += 2.0 * PI * rate_hz / sample_rate;
        if self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Normalized biquad coefficients (a0 folded in)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Pass-through coefficients
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// RBJ low shelf with linear amplitude `a`
    pub fn low_shelf(freq: f32, q: f32, a: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let sqrt_a = a.sqrt();

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
            a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha),
            (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
            (a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha,
        )
    }

    /// RBJ high shelf with linear amplitude `a`
    pub fn high_shelf(freq: f32, q: f32, a: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let sqrt_a = a.sqrt();

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha),
            (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha,
        )
    }

    /// RBJ peaking EQ with linear amplitude `a`
    pub fn peaking(freq: f32, q: f32, a: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// RBJ second-order lowpass
    pub fn low_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let b1 = 1.0 - cos_w0;

        Self::normalized(b1 * 0.5, b1, b1 * 0.5, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// RBJ second-order highpass
    pub fn high_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let b1 = 1.0 + cos_w0;

        Self::normalized(b1 * 0.5, -b1, b1 * 0.5, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// RBJ band-pass (constant 0 dB peak gain)
    pub fn band_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }
}

/// Transposed direct-form II biquad state
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    z1: f32,
    z2: f32,
}

impl Biquad {
    #[inline]
    pub fn process(&mut self, input: f32, c: &BiquadCoeffs) -> f32 {
        let out = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * out + self.z2;
        self.z2 = c.b2 * input - c.a2 * out;
        out
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_clip_limits() {
        assert_eq!(soft_clip(5.0), 1.0);
        assert_eq!(soft_clip(-5.0), -1.0);
        // Continuous at the knee
        assert!((soft_clip(3.0) - 1.0).abs() < 1e-6);
        assert!((soft_clip(0.1) - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_soft_limit_unclamped() {
        // Rational curve keeps rising past 3
        assert!(soft_limit(6.0) > 1.0);
        assert!(soft_limit(-6.0) < -1.0);
        assert_eq!(soft_limit(0.0), 0.0);
    }

    #[test]
    fn test_one_pole_converges() {
        let mut lp = OnePole::new();
        let coeff = one_pole_coeff(1000.0, 48000.0);
        for _ in 0..4800 {
            lp.process(1.0, coeff);
        }
        assert!((lp.value() - 1.0).abs() < 1e-3, "got {}", lp.value());
    }

    #[test]
    fn test_cubic_interp_endpoints() {
        assert!((cubic_interp(0.0, 1.0, 2.0, 3.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((cubic_interp(0.0, 1.0, 2.0, 3.0, 1.0) - 2.0).abs() < 1e-6);
        // Straight line stays straight
        assert!((cubic_interp(0.0, 1.0, 2.0, 3.0, 0.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_thiran_integer_delay_passthrough() {
        // frac = 0 => a = 1, y = -y_prev + x0 + x1; with x0 == x1 == y_prev
        // on a DC signal the output settles at the input
        let mut t = Thiran::default();
        let mut y = 0.0;
        for _ in 0..64 {
            y = t.process(0.5, 0.5, 0.5);
        }
        assert!((y - 0.5).abs() < 1e-3, "got {}", y);
    }

    #[test]
    fn test_triangle_lfo_shape() {
        let mut lfo = TriangleLfo::default();
        assert_eq!(lfo.value(), 0.0);
        lfo.advance(0.25);
        assert!((lfo.value() - 0.5).abs() < 1e-6);
        lfo.advance(0.25);
        assert!((lfo.value() - 1.0).abs() < 1e-6);
        lfo.advance(0.5);
        assert!(lfo.value() < 1e-6);
    }

    #[test]
    fn test_db_gain_roundtrip() {
        assert!((db_to_gain(-6.0) - 0.501).abs() < 0.001);
        assert!((gain_to_db(db_to_gain(-18.0)) + 18.0).abs() < 1e-3);
        assert_eq!(gain_to_db(0.0), -120.0);
    }

    #[test]
    fn test_flat_shelf_is_identity() {
        let c = BiquadCoeffs::low_shelf(80.0, 0.707, 1.0, 48000.0);
        let mut bq = Biquad::default();
        for i in 0..32 {
            let x = (i as f32 * 0.3).sin();
            let y = bq.process(x, &c);
            assert!((x - y).abs() < 1e-4, "sample {}: {} vs {}", i, x, y);
        }
    }
}
