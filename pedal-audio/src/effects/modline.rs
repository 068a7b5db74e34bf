//! Short modulated delay line shared by the chorus and flanger.

use crate::dsp::Thiran;

/// Mono circular buffer read through a first-order Thiran allpass
pub(crate) struct ModulatedLine {
    buffer: Vec<f32>,
    thiran: Thiran,
}

impl ModulatedLine {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            thiran: Thiran::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Read `delay` samples behind `write_idx`
    #[inline]
    pub(crate) fn read(&mut self, write_idx: usize, delay: f32) -> f32 {
        let len = self.buffer.len();
        let int_delay = delay.floor() as usize;
        let frac = delay - int_delay as f32;

        let read_idx = (write_idx + 2 * len - int_delay - 1) % len;
        let next_idx = (read_idx + 1) % len;

        self.thiran
            .process(self.buffer[read_idx], self.buffer[next_idx], frac)
    }

    #[inline]
    pub(crate) fn write(&mut self, write_idx: usize, value: f32) {
        self.buffer[write_idx] = value;
    }

    pub(crate) fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.thiran.reset();
    }
}
