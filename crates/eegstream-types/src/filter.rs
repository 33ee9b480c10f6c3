//! Zero-phase Butterworth band-pass filtering.
//!
//! The filter is designed the classic way: an analog Butterworth low-pass
//! prototype is transformed to a band-pass around pre-warped cutoffs and
//! mapped to the z-plane with the bilinear transform. Coefficients are kept
//! in transfer-function form `(b, a)` with `a[0] == 1`.
//!
//! [`BandPassFilter::filtfilt`] runs the filter forward and then backward so
//! the result has no phase shift. The series is extended at both ends by odd
//! reflection and each pass starts from the steady-state initial conditions
//! scaled by the first input, which keeps edge transients small.

use num_complex::Complex64;

use crate::error::FilterError;

/// Highest supported prototype order.
pub const MAX_ORDER: usize = 10;

/// Butterworth band-pass filter in transfer-function form.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPassFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl BandPassFilter {
    /// Design a band-pass with the given cutoffs (Hz), sample rate and order.
    ///
    /// The resulting filter has `2 * order` poles.
    pub fn butterworth(
        low_hz: f64,
        high_hz: f64,
        sample_rate_hz: f64,
        order: usize,
    ) -> Result<Self, FilterError> {
        if order == 0 || order > MAX_ORDER {
            return Err(FilterError::InvalidOrder {
                order,
                max: MAX_ORDER,
            });
        }
        let nyquist = sample_rate_hz / 2.0;
        let valid = low_hz.is_finite()
            && high_hz.is_finite()
            && sample_rate_hz.is_finite()
            && low_hz > 0.0
            && low_hz < high_hz
            && high_hz < nyquist;
        if !valid {
            return Err(FilterError::InvalidBand {
                low_hz,
                high_hz,
                sample_rate_hz,
            });
        }

        // Work at a normalized sample rate of 2 so cutoffs are fractions of Nyquist.
        let fs = 2.0;
        let warp = |hz: f64| 2.0 * fs * (std::f64::consts::PI * (hz / nyquist) / fs).tan();
        let w1 = warp(low_hz);
        let w2 = warp(high_hz);
        let bw = w2 - w1;
        let wo = (w1 * w2).sqrt();

        // Analog low-pass prototype: unit gain, poles on the left half circle.
        let n = order as f64;
        let prototype: Vec<Complex64> = (0..order)
            .map(|i| {
                let m = -(n - 1.0) + 2.0 * i as f64;
                -Complex64::from_polar(1.0, std::f64::consts::PI * m / (2.0 * n))
            })
            .collect();

        // Low-pass to band-pass: each pole splits in two, `order` zeros land at the origin.
        let mut poles = Vec::with_capacity(2 * order);
        for p in &prototype {
            let scaled = *p * (bw / 2.0);
            let root = (scaled * scaled - wo * wo).sqrt();
            poles.push(scaled + root);
            poles.push(scaled - root);
        }
        let zeros = vec![Complex64::new(0.0, 0.0); order];
        let gain = bw.powi(order as i32);

        // Bilinear transform.
        let fs2 = Complex64::new(2.0 * fs, 0.0);
        let num: Complex64 = zeros.iter().map(|z| fs2 - z).product();
        let den: Complex64 = poles.iter().map(|p| fs2 - p).product();
        let gain = gain * (num / den).re;

        let mut z_zeros: Vec<Complex64> = zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
        z_zeros.extend(std::iter::repeat_n(Complex64::new(-1.0, 0.0), poles.len() - zeros.len()));
        let z_poles: Vec<Complex64> = poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();

        let b = poly(&z_zeros).into_iter().map(|c| gain * c.re).collect();
        let a = poly(&z_poles).into_iter().map(|c| c.re).collect();

        Ok(Self { b, a })
    }

    /// Numerator coefficients.
    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    /// Denominator coefficients (`a[0] == 1`).
    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    /// Number of samples added at each end before forward-backward filtering.
    pub fn pad_len(&self) -> usize {
        3 * self.a.len().max(self.b.len())
    }

    /// Magnitude of the frequency response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        let w = std::f64::consts::TAU * freq_hz / sample_rate_hz;
        let eval = |coeffs: &[f64]| -> Complex64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| Complex64::from_polar(*c, -w * k as f64))
                .sum()
        };
        (eval(&self.b) / eval(&self.a)).norm()
    }

    /// Filter `x` once, forward, with direct form II transposed.
    ///
    /// `state` holds the delay line and is updated in place. Its length must
    /// be [`state_len`](Self::state_len).
    pub fn lfilter(&self, x: &[f64], state: &mut [f64]) -> Result<Vec<f64>, FilterError> {
        let order = self.state_len();
        if state.len() != order {
            return Err(FilterError::StateLength {
                len: state.len(),
                expected: order,
            });
        }
        let mut y = Vec::with_capacity(x.len());
        for &xn in x {
            let yn = self.b[0] * xn + state.first().copied().unwrap_or(0.0);
            for i in 0..order {
                let next = if i + 1 < order { state[i + 1] } else { 0.0 };
                state[i] = self.b[i + 1] * xn + next - self.a[i + 1] * yn;
            }
            y.push(yn);
        }
        Ok(y)
    }

    /// Length of the delay line used by [`lfilter`](Self::lfilter).
    pub fn state_len(&self) -> usize {
        self.a.len().max(self.b.len()) - 1
    }

    /// Steady-state delay line for a unit step input.
    pub fn steady_state(&self) -> Result<Vec<f64>, FilterError> {
        let n = self.a.len() - 1;
        // (I - companion(a)^T) zi = b[1..] - a[1..] * b[0]
        let mut m = vec![vec![0.0; n]; n];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] += 1.0;
            row[0] += self.a[i + 1];
            if i + 1 < n {
                row[i + 1] -= 1.0;
            }
        }
        let rhs: Vec<f64> = (0..n)
            .map(|i| self.b[i + 1] - self.a[i + 1] * self.b[0])
            .collect();
        solve(m, rhs)
    }

    /// Zero-phase forward-backward filtering of `x`.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        let pad = self.pad_len();
        if x.len() <= pad {
            return Err(FilterError::InputTooShort {
                len: x.len(),
                required: pad,
            });
        }
        let zi = self.steady_state()?;
        let extended = odd_extend(x, pad);

        let mut state: Vec<f64> = zi.iter().map(|z| z * extended[0]).collect();
        let mut forward = self.lfilter(&extended, &mut state)?;

        forward.reverse();
        let mut state: Vec<f64> = zi.iter().map(|z| z * forward[0]).collect();
        let mut backward = self.lfilter(&forward, &mut state)?;
        backward.reverse();

        Ok(backward[pad..backward.len() - pad].to_vec())
    }
}

/// Monic polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = coeffs.clone();
        next.push(Complex64::new(0.0, 0.0));
        for (i, c) in coeffs.iter().enumerate() {
            next[i + 1] -= root * c;
        }
        coeffs = next;
    }
    coeffs
}

/// Extend `x` by `pad` samples at each end, reflected through the end points.
fn odd_extend(x: &[f64], pad: usize) -> Vec<f64> {
    let first = x[0];
    let last = x[x.len() - 1];
    let mut out = Vec::with_capacity(x.len() + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=pad).map(|i| 2.0 * last - x[x.len() - 1 - i]));
    out
}

/// Solve `m * x = rhs` by Gaussian elimination with partial pivoting.
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, FilterError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .ok_or(FilterError::Singular)?;
        if m[pivot][col].abs() < 1e-300 {
            return Err(FilterError::Singular);
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }
    Ok(x)
}
