use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::PcmBuffer;

pub const TIME_BINS: usize = 128;
pub const FREQ_BINS: usize = 128;

const WINDOW_SIZE: usize = 1024;
const RAW_BINS: usize = WINDOW_SIZE / 2;
const BIN_GROUP: usize = RAW_BINS / FREQ_BINS;
const TIME_SMOOTH_RADIUS: usize = 6;
const FREQ_SMOOTH_RADIUS: usize = 5;

/// Time-frequency energy grid for one clip, always `TIME_BINS x FREQ_BINS`
/// regardless of input length.
///
/// Rows are stored newest-first: row 0 holds the end of the clip and row
/// `TIME_BINS - 1` the start. The scanner walks rows from the back of the
/// matrix toward row 0 as playback progresses, so with this ordering it
/// reads the clip in chronological order.
///
/// A matrix is immutable once published; a new load produces a wholly new
/// matrix object.
#[derive(Clone)]
pub struct SpectrogramMatrix {
    data: Vec<f32>,
}

impl SpectrogramMatrix {
    pub fn time_bins(&self) -> usize {
        TIME_BINS
    }

    pub fn freq_bins(&self) -> usize {
        FREQ_BINS
    }

    #[cfg(test)]
    pub(crate) fn from_values(data: Vec<f32>) -> Self {
        assert_eq!(data.len(), TIME_BINS * FREQ_BINS);
        Self { data }
    }

    pub fn at(&self, t: usize, f: usize) -> f32 {
        self.data[t * FREQ_BINS + f]
    }

    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * FREQ_BINS..(t + 1) * FREQ_BINS]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn peak(&self) -> f32 {
        self.data.iter().copied().fold(0.0f32, f32::max)
    }

    /// Global peak used to normalize heights, with the silence guard:
    /// an all-zero matrix divides by 1 so every height is 0, never NaN.
    /// Terrain and scanner must both normalize against this value.
    pub fn normalization_peak(&self) -> f32 {
        let peak = self.peak();
        if peak > 0.0 {
            peak
        } else {
            1.0
        }
    }
}

/// Turn decoded PCM into the energy matrix. Deterministic and pure: the
/// same buffer always yields the same matrix, and no input can fail.
/// Silence produces an all-zero matrix.
pub fn analyze(pcm: &PcmBuffer) -> SpectrogramMatrix {
    let samples = &pcm.samples;
    let hop = samples.len() as f64 / TIME_BINS as f64;
    let hann = hann_window(WINDOW_SIZE);

    log::debug!(
        "Analyzing {} samples ({} frames, hop {:.1})",
        samples.len(),
        TIME_BINS,
        hop
    );

    let rows: Vec<Vec<f32>> = (0..TIME_BINS)
        .into_par_iter()
        .map(|k| frame_spectrum(samples, (k as f64 * hop) as usize, &hann))
        .collect();

    // Chronological frame k lands in row TIME_BINS - 1 - k (newest-first).
    let mut data = vec![0.0f32; TIME_BINS * FREQ_BINS];
    for (k, row) in rows.into_iter().enumerate() {
        let t = TIME_BINS - 1 - k;
        data[t * FREQ_BINS..(t + 1) * FREQ_BINS].copy_from_slice(&row);
    }

    let mut matrix = SpectrogramMatrix { data };
    smooth_time_axis(&mut matrix, TIME_SMOOTH_RADIUS);
    smooth_freq_axis(&mut matrix, FREQ_SMOOTH_RADIUS);
    matrix
}

/// Windowed magnitude spectrum of one analysis frame, compressed and
/// grouped down to `FREQ_BINS` output bins. Frames that run past the end
/// of the buffer are zero-padded.
fn frame_spectrum(samples: &[f32], start: usize, hann: &[f32]) -> Vec<f32> {
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); WINDOW_SIZE];
    let start = start.min(samples.len());
    let end = (start + WINDOW_SIZE).min(samples.len());
    for (i, &s) in samples[start..end].iter().enumerate() {
        buffer[i] = Complex::new(s * hann[i], 0.0);
    }

    // Per-thread FFT planner (rayon-safe)
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(WINDOW_SIZE);
    fft.process(&mut buffer);

    let mut row = vec![0.0f32; FREQ_BINS];
    for (f, group) in buffer[..RAW_BINS].chunks_exact(BIN_GROUP).enumerate() {
        let sum: f32 = group.iter().map(|c| compress(c.norm())).sum();
        row[f] = sum / BIN_GROUP as f32;
    }
    row
}

/// Bound the dynamic range of a raw magnitude.
fn compress(magnitude: f32) -> f32 {
    ((magnitude + 1.0).log10() * 40.0).min(255.0)
}

/// Moving average with a variable-count window: boundary elements average
/// only their in-range neighbors instead of assumed-zero padding.
pub(crate) fn moving_average(values: &[f32], radius: usize) -> Vec<f32> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            values[lo..hi].iter().sum::<f32>() / (hi - lo) as f32
        })
        .collect()
}

fn smooth_time_axis(matrix: &mut SpectrogramMatrix, radius: usize) {
    for f in 0..FREQ_BINS {
        let column: Vec<f32> = (0..TIME_BINS).map(|t| matrix.at(t, f)).collect();
        for (t, v) in moving_average(&column, radius).into_iter().enumerate() {
            matrix.data[t * FREQ_BINS + f] = v;
        }
    }
}

fn smooth_freq_axis(matrix: &mut SpectrogramMatrix, radius: usize) {
    for t in 0..TIME_BINS {
        let row = moving_average(matrix.row(t), radius);
        matrix.data[t * FREQ_BINS..(t + 1) * FREQ_BINS].copy_from_slice(&row);
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: Vec<f32>) -> PcmBuffer {
        PcmBuffer {
            samples,
            sample_rate: 44_100,
        }
    }

    #[test]
    fn output_shape_is_fixed_for_any_input_length() {
        for len in [100usize, 1_024, 50_000] {
            let matrix = analyze(&pcm(vec![0.1; len]));
            assert_eq!(matrix.values().len(), TIME_BINS * FREQ_BINS);
        }
    }

    #[test]
    fn silence_yields_all_zero_matrix() {
        let matrix = analyze(&pcm(vec![0.0; 30_000]));
        assert!(matrix.values().iter().all(|&v| v == 0.0));
        assert_eq!(matrix.normalization_peak(), 1.0);
    }

    #[test]
    fn analysis_is_deterministic() {
        let samples: Vec<f32> = (0..20_000).map(|i| (i as f32 * 0.05).sin()).collect();
        let a = analyze(&pcm(samples.clone()));
        let b = analyze(&pcm(samples));
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn clip_head_lands_in_last_row() {
        // Energy only in the first window of the clip. With newest-first
        // row order it must surface at the back of the matrix.
        let mut samples = vec![0.0f32; 128_000];
        for (i, s) in samples.iter_mut().take(512).enumerate() {
            *s = (i as f32 * 0.3).sin();
        }
        let matrix = analyze(&pcm(samples));

        let row_energy = |t: usize| matrix.row(t).iter().sum::<f32>();
        assert!(row_energy(TIME_BINS - 1) > 0.0);
        // Far from the head even the temporal smoothing window sees nothing.
        assert_eq!(row_energy(0), 0.0);
        assert_eq!(row_energy(TIME_BINS / 2), 0.0);
    }

    #[test]
    fn moving_average_preserves_length() {
        let values = vec![1.0; 40];
        assert_eq!(moving_average(&values, 6).len(), 40);
    }

    #[test]
    fn moving_average_boundaries_use_only_in_range_neighbors() {
        let values: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let out = moving_average(&values, 6);
        // Element 0 averages elements 0..=6, not 13 values with zero padding.
        assert!((out[0] - 3.0).abs() < 1e-6);
        // Interior elements get the full window.
        assert!((out[10] - 10.0).abs() < 1e-6);
        // A constant signal stays constant right up to the edges.
        let flat = moving_average(&vec![5.0; 20], 6);
        assert!(flat.iter().all(|v| (v - 5.0).abs() < 1e-6));
    }

    #[test]
    fn energies_are_non_negative_and_bounded() {
        let samples: Vec<f32> = (0..40_000).map(|i| (i as f32 * 0.21).sin()).collect();
        let matrix = analyze(&pcm(samples));
        assert!(matrix.values().iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(matrix.peak() > 0.0);
    }
}
