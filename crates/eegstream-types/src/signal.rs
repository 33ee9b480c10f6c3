//! Synthetic EEG-like signal generation.
//!
//! The waveform is the sum of three sinusoids in the alpha (10 Hz), theta
//! (6 Hz) and beta (20 Hz) bands, plus Gaussian noise, a rare positive spike
//! that models an artifact burst, and a fixed per-channel offset.

use std::collections::HashMap;
use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::ChannelId;

/// Alpha band component as `(frequency_hz, amplitude)`.
pub const ALPHA: (f64, f64) = (10.0, 1.1);
/// Theta band component as `(frequency_hz, amplitude)`.
pub const THETA: (f64, f64) = (6.0, 0.7);
/// Beta band component as `(frequency_hz, amplitude)`.
pub const BETA: (f64, f64) = (20.0, 0.5);

/// Standard deviation of the additive Gaussian noise.
pub const NOISE_STD_DEV: f64 = 0.25;
/// Probability that a single call adds a spike.
pub const SPIKE_PROBABILITY: f64 = 0.01;
/// Lower bound (inclusive) of a spike's amplitude.
pub const SPIKE_MIN: f64 = 2.0;
/// Upper bound (exclusive) of a spike's amplitude.
pub const SPIKE_MAX: f64 = 5.0;

/// Offset of the `A3` lead.
pub const A3_OFFSET: f64 = 0.15;
/// Offset of any channel without a configured offset.
pub const DEFAULT_OFFSET: f64 = -0.05;

/// Upper bound of `|waveform(t)|`.
pub const WAVEFORM_BOUND: f64 = ALPHA.1 + THETA.1 + BETA.1;

/// Deterministic part of the signal at `t` seconds.
///
/// Non-finite `t` yields `0.0` so that callers never see NaN from this part.
pub fn waveform(t: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    [ALPHA, THETA, BETA]
        .iter()
        .map(|(freq, amp)| amp * (TAU * freq * t).sin())
        .sum()
}

/// Generator of synthetic samples with an injectable random source.
///
/// The only mutable state is the random number generator, so one generator
/// can be called once per `(tick, channel)` pair without coordination.
#[derive(Debug, Clone)]
pub struct SignalGenerator<R = StdRng> {
    rng: R,
    offsets: HashMap<ChannelId, f64>,
    default_offset: f64,
}

impl SignalGenerator<StdRng> {
    /// Generator seeded from the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Generator seeded with `seed`, or from entropy when `None`.
    pub fn seeded(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(StdRng::seed_from_u64(seed)),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> SignalGenerator<R> {
    /// Create a generator with the default channel offsets.
    pub fn new(rng: R) -> Self {
        let mut offsets = HashMap::new();
        offsets.insert(ChannelId::a3(), A3_OFFSET);
        Self {
            rng,
            offsets,
            default_offset: DEFAULT_OFFSET,
        }
    }

    /// Set the offset for one channel.
    pub fn with_offset(mut self, channel: ChannelId, offset: f64) -> Self {
        self.offsets.insert(channel, offset);
        self
    }

    /// Set the offset used for channels without an explicit one.
    pub fn with_default_offset(mut self, offset: f64) -> Self {
        self.default_offset = offset;
        self
    }

    /// Offset applied to `channel`.
    pub fn offset(&self, channel: &ChannelId) -> f64 {
        self.offsets
            .get(channel)
            .copied()
            .unwrap_or(self.default_offset)
    }

    /// One sample for `channel` at `t` seconds since the producer started.
    pub fn generate(&mut self, t: f64, channel: &ChannelId) -> f64 {
        let noise = standard_normal(&mut self.rng) * NOISE_STD_DEV;
        let spike = if self.rng.random_bool(SPIKE_PROBABILITY) {
            self.rng.random_range(SPIKE_MIN..SPIKE_MAX)
        } else {
            0.0
        };
        waveform(t) + noise + spike + self.offset(channel)
    }
}

/// Standard normal draw via the Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln() finite
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn generate_is_bounded_for_any_finite_time(t in -1.0e6f64..1.0e6, seed in any::<u64>()) {
            let mut generator = SignalGenerator::seeded(Some(seed));
            let value = generator.generate(t, &ChannelId::a3());
            prop_assert!(value.is_finite());
            prop_assert!(value.abs() < 20.0);
        }

        #[test]
        fn waveform_never_exceeds_bound(t in any::<f64>()) {
            prop_assert!(waveform(t).abs() <= WAVEFORM_BOUND + 1e-9);
        }
    }
}
