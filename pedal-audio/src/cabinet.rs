//! Speaker cabinet simulation
//!
//! A 256-tap direct-form FIR per channel. Sixteen named slots each hold an
//! impulse response; the defaults are synthesized from a per-cabinet
//! voicing (low cut, cone resonance, presence peak, high rolloff) and any
//! slot can be replaced with a measured response via [`Cabinet::load_ir`].

use crate::dsp::{Biquad, BiquadCoeffs};
use crate::error::CabinetError;

/// FIR length
pub const CABINET_TAPS: usize = 256;

/// Number of cabinet slots
pub const CABINET_SLOTS: usize = 16;

pub const CABINET_NAMES: [&str; CABINET_SLOTS] = [
    "Marshall 1960",
    "American Twin",
    "British Alnico",
    "British 4x12",
    "Brown Deluxe",
    "Magma Vintage",
    "Modern Boutique",
    "Tweed Combo",
    "Vox AC30",
    "JCM900",
    "Orange",
    "Vintage Marshall",
    "JMP Plexi",
    "GuitarHack Edge",
    "faIR Fredman",
    "London City",
];

/// Frequency-domain sketch of a cabinet, used to synthesize its IR
#[derive(Debug, Clone, Copy)]
struct Voicing {
    low_cut: f32,
    resonance: f32,
    resonance_db: f32,
    presence: f32,
    presence_db: f32,
    high_cut: f32,
}

const fn v(
    low_cut: f32,
    resonance: f32,
    resonance_db: f32,
    presence: f32,
    presence_db: f32,
    high_cut: f32,
) -> Voicing {
    Voicing {
        low_cut,
        resonance,
        resonance_db,
        presence,
        presence_db,
        high_cut,
    }
}

const VOICINGS: [Voicing; CABINET_SLOTS] = [
    v(90.0, 110.0, 4.0, 2500.0, 3.0, 5000.0),
    v(70.0, 100.0, 2.0, 3500.0, 1.0, 6500.0),
    v(90.0, 120.0, 3.0, 2200.0, 4.0, 5000.0),
    v(85.0, 105.0, 5.0, 2800.0, 3.0, 5200.0),
    v(80.0, 130.0, 3.0, 2000.0, 2.0, 4500.0),
    v(95.0, 115.0, 4.0, 2400.0, 2.0, 4800.0),
    v(75.0, 100.0, 3.0, 3000.0, 2.0, 6000.0),
    v(100.0, 140.0, 2.0, 1800.0, 3.0, 4000.0),
    v(100.0, 120.0, 2.0, 3200.0, 5.0, 5500.0),
    v(85.0, 100.0, 5.0, 2700.0, 4.0, 5000.0),
    v(80.0, 95.0, 6.0, 2000.0, 2.0, 4500.0),
    v(95.0, 115.0, 3.0, 2300.0, 3.0, 4600.0),
    v(90.0, 110.0, 3.0, 2600.0, 4.0, 5200.0),
    v(80.0, 100.0, 4.0, 3000.0, 3.0, 5800.0),
    v(85.0, 95.0, 5.0, 2500.0, 4.0, 5400.0),
    v(90.0, 125.0, 3.0, 2100.0, 3.0, 4800.0),
];

/// Samples at the end of a synthesized IR that fade to zero
const TAIL_FADE: usize = 32;

/// Scale so the largest tap has magnitude 1. An all-zero IR is left as is.
pub fn normalize_peak(ir: &mut [f32]) {
    let peak = ir.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        ir.iter_mut().for_each(|s| *s /= peak);
    }
}

/// Render the impulse response for a voicing
fn synthesize(voicing: &Voicing, sample_rate: f32) -> [f32; CABINET_TAPS] {
    let amp = |db: f32| 10.0_f32.powf(db / 40.0);
    let stages = [
        BiquadCoeffs::high_pass(voicing.low_cut, 0.707, sample_rate),
        BiquadCoeffs::peaking(voicing.resonance, 1.4, amp(voicing.resonance_db), sample_rate),
        BiquadCoeffs::peaking(voicing.presence, 1.0, amp(voicing.presence_db), sample_rate),
        BiquadCoeffs::low_pass(voicing.high_cut, 0.707, sample_rate),
        BiquadCoeffs::low_pass(voicing.high_cut * 1.3, 0.6, sample_rate),
    ];
    let mut filters = [Biquad::default(); 5];

    let mut ir = [0.0; CABINET_TAPS];
    for (n, tap) in ir.iter_mut().enumerate() {
        let mut s = if n == 0 { 1.0 } else { 0.0 };
        for (filter, coeffs) in filters.iter_mut().zip(stages.iter()) {
            s = filter.process(s, coeffs);
        }
        *tap = s;
    }

    for i in 0..TAIL_FADE {
        let g = 0.5 + 0.5 * (std::f32::consts::PI * (i + 1) as f32 / TAIL_FADE as f32).cos();
        ir[CABINET_TAPS - TAIL_FADE + i] *= g;
    }

    normalize_peak(&mut ir);
    ir
}

/// FIR history laid out twice so the newest `CABINET_TAPS` samples are
/// always contiguous
struct FirState {
    history: [f32; CABINET_TAPS * 2],
    pos: usize,
}

impl FirState {
    fn new() -> Self {
        Self {
            history: [0.0; CABINET_TAPS * 2],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32, ir: &[f32; CABINET_TAPS]) -> f32 {
        self.history[self.pos] = x;
        self.history[self.pos + CABINET_TAPS] = x;

        let newest = self.pos + CABINET_TAPS;
        let window = &self.history[newest + 1 - CABINET_TAPS..=newest];
        let y: f32 = ir
            .iter()
            .zip(window.iter().rev())
            .map(|(h, s)| h * s)
            .sum();

        self.pos = (self.pos + 1) % CABINET_TAPS;
        y
    }

    fn clear(&mut self) {
        self.history.fill(0.0);
        self.pos = 0;
    }
}

pub struct Cabinet {
    impulses: Vec<[f32; CABINET_TAPS]>,
    selected: usize,
    enabled: bool,
    left: FirState,
    right: FirState,
}

impl Cabinet {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            impulses: VOICINGS.iter().map(|v| synthesize(v, sample_rate)).collect(),
            selected: 0,
            enabled: false,
            left: FirState::new(),
            right: FirState::new(),
        }
    }

    pub fn name(slot: usize) -> Option<&'static str> {
        CABINET_NAMES.get(slot).copied()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_name(&self) -> &'static str {
        CABINET_NAMES[self.selected]
    }

    /// Choose the active slot. Filter history is cleared.
    pub fn select(&mut self, slot: usize) -> Result<(), CabinetError> {
        if slot >= CABINET_SLOTS {
            return Err(CabinetError::IndexOutOfRange(slot));
        }
        self.selected = slot;
        self.clear_history();
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.clear_history();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace a slot's impulse response. Longer responses are truncated,
    /// shorter ones zero-padded.
    pub fn load_ir(&mut self, slot: usize, ir: &[f32]) -> Result<(), CabinetError> {
        if slot >= CABINET_SLOTS {
            return Err(CabinetError::IndexOutOfRange(slot));
        }
        if ir.is_empty() {
            return Err(CabinetError::EmptyImpulse);
        }

        let mut taps = [0.0; CABINET_TAPS];
        let n = ir.len().min(CABINET_TAPS);
        taps[..n].copy_from_slice(&ir[..n]);
        self.impulses[slot] = taps;

        if slot == self.selected {
            self.clear_history();
        }
        Ok(())
    }

    pub fn impulse(&self, slot: usize) -> Option<&[f32; CABINET_TAPS]> {
        self.impulses.get(slot)
    }

    pub fn clear_history(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    pub fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        if !self.enabled {
            out_l.copy_from_slice(in_l);
            out_r.copy_from_slice(in_r);
            return;
        }

        let ir = &self.impulses[self.selected];
        for i in 0..out_l.len() {
            out_l[i] = self.left.process(in_l[i], ir).clamp(-1.0, 1.0);
            out_r[i] = self.right.process(in_r[i], ir).clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let mut cab = Cabinet::new(48000.0);
        assert!(!cab.is_enabled());
        let input: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        let mut l = vec![0.0; 64];
        let mut r = vec![0.0; 64];
        cab.process(&input, &input, &mut l, &mut r);
        assert_eq!(l, input);
    }

    #[test]
    fn test_impulse_reproduces_ir() {
        let mut cab = Cabinet::new(48000.0);
        cab.set_enabled(true);
        let ir: Vec<f32> = (0..CABINET_TAPS).map(|i| 0.5 / (i + 1) as f32).collect();
        cab.load_ir(0, &ir).unwrap();

        let mut input = vec![0.0; 512];
        input[0] = 1.0;
        let mut l = vec![0.0; 512];
        let mut r = vec![0.0; 512];
        cab.process(&input, &input, &mut l, &mut r);

        for n in 0..CABINET_TAPS {
            assert!((l[n] - ir[n]).abs() < 1e-6, "tap {}: {} vs {}", n, l[n], ir[n]);
        }
        assert!(l[CABINET_TAPS..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_fir_wraps_history() {
        let mut cab = Cabinet::new(48000.0);
        cab.set_enabled(true);
        cab.load_ir(3, &[0.0, 0.0, 1.0]).unwrap();
        cab.select(3).unwrap();

        let input: Vec<f32> = (0..1000).map(|i| ((i % 17) as f32 - 8.0) / 10.0).collect();
        let mut l = vec![0.0; 1000];
        let mut r = vec![0.0; 1000];
        cab.process(&input, &input, &mut l, &mut r);
        for n in 2..1000 {
            assert!((l[n] - input[n - 2]).abs() < 1e-6, "sample {}", n);
        }
    }

    #[test]
    fn test_output_hard_clipped() {
        let mut cab = Cabinet::new(48000.0);
        cab.set_enabled(true);
        cab.load_ir(0, &[1.0, 1.0, 1.0]).unwrap();
        let input = vec![0.9; 16];
        let mut l = vec![0.0; 16];
        let mut r = vec![0.0; 16];
        cab.process(&input, &input, &mut l, &mut r);
        assert!(l.iter().all(|s| *s <= 1.0));
        assert_eq!(l[15], 1.0);
    }

    #[test]
    fn test_load_ir_errors() {
        let mut cab = Cabinet::new(48000.0);
        assert_eq!(cab.load_ir(0, &[]), Err(CabinetError::EmptyImpulse));
        assert_eq!(cab.load_ir(16, &[1.0]), Err(CabinetError::IndexOutOfRange(16)));
        assert_eq!(cab.select(20), Err(CabinetError::IndexOutOfRange(20)));
    }

    #[test]
    fn test_synthesized_irs_normalized_and_distinct() {
        let cab = Cabinet::new(48000.0);
        for slot in 0..CABINET_SLOTS {
            let ir = cab.impulse(slot).unwrap();
            let peak = ir.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!((peak - 1.0).abs() < 1e-5, "{} peak {}", CABINET_NAMES[slot], peak);
            assert!(ir.iter().all(|s| s.is_finite()));
        }
        assert_ne!(cab.impulse(0), cab.impulse(1));
    }
}
