use crate::audio::spectrogram::SpectrogramMatrix;

use super::terrain::HEIGHT_HEADROOM;

/// Number of crest sample points across the frequency axis. Decoupled from
/// the matrix's frequency resolution; resampled nearest-neighbor.
pub const SCAN_POINTS: usize = 96;

/// Playback timeline on the scheduler's clock. Armed atomically by
/// `play`; `playing` flips to false exactly once, either past `duration`
/// or on an explicit stop.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    pub start_time: f64,
    pub duration: f64,
    pub playing: bool,
}

impl PlaybackClock {
    /// Monotonic playback progress in 0..=1, or None when the clock is
    /// stopped or has run past its duration.
    pub fn progress(&self, now: f64) -> Option<f64> {
        if !self.playing || self.duration <= 0.0 {
            return None;
        }
        let elapsed = now - self.start_time;
        if elapsed > self.duration {
            return None;
        }
        Some((elapsed / self.duration).max(0.0))
    }
}

/// Per-frame wavefront geometry: the crest line strip at the current
/// playback position and a curtain dropping from it to the base plane.
/// The curtain's top vertices reuse the crest positions. Ephemeral:
/// recomputed every frame, never persisted.
pub struct ScanOverlay {
    pub crest: Vec<[f32; 3]>,
    /// Interleaved top/bottom vertices, `2 * SCAN_POINTS` entries.
    pub curtain_positions: Vec<[f32; 3]>,
    pub curtain_indices: Vec<u32>,
}

pub struct PlaybackScanner {
    volume_size: f32,
}

impl PlaybackScanner {
    pub fn new(volume_size: f32) -> Self {
        Self { volume_size }
    }

    /// Overlay for the current frame, or None when idle. Heights are
    /// normalized against the same global peak the terrain build uses, so
    /// the crest sits exactly on the ridge currently playing.
    pub fn scan(
        &self,
        clock: &PlaybackClock,
        now: f64,
        matrix: &SpectrogramMatrix,
    ) -> Option<ScanOverlay> {
        let progress = clock.progress(now)?;
        Some(self.overlay_at(progress, matrix))
    }

    pub(crate) fn overlay_at(&self, progress: f64, matrix: &SpectrogramMatrix) -> ScanOverlay {
        let time_bins = matrix.time_bins();
        let freq_bins = matrix.freq_bins();
        let t = time_index(progress, time_bins);

        let peak = matrix.normalization_peak();
        let max_height = self.volume_size * HEIGHT_HEADROOM;
        // Raised a hair off the surface so the crest does not z-fight the
        // terrain triangles it traces.
        let lift = self.volume_size * 0.004;
        let z = t as f32 / (time_bins - 1) as f32 * self.volume_size;

        let mut crest = Vec::with_capacity(SCAN_POINTS);
        for p in 0..SCAN_POINTS {
            let ratio = p as f32 / (SCAN_POINTS - 1) as f32;
            let f = ((ratio * (freq_bins - 1) as f32).floor() as usize).min(freq_bins - 1);
            let level = matrix.at(t, f) / peak;
            let x = ratio * self.volume_size;
            crest.push([x, level * max_height + lift, z]);
        }

        let mut curtain_positions = Vec::with_capacity(2 * SCAN_POINTS);
        for &top in &crest {
            curtain_positions.push(top);
            curtain_positions.push([top[0], 0.0, top[2]]);
        }

        let mut curtain_indices = Vec::with_capacity((SCAN_POINTS - 1) * 6);
        for p in 0..(SCAN_POINTS as u32 - 1) {
            let top = 2 * p;
            let bottom = top + 1;
            curtain_indices.extend_from_slice(&[
                top,
                bottom,
                top + 2,
                top + 2,
                bottom,
                bottom + 2,
            ]);
        }

        ScanOverlay {
            crest,
            curtain_positions,
            curtain_indices,
        }
    }
}

/// Matrix row for a playback progress value. The matrix stores rows
/// newest-first, so the sweep traverses indices from the back toward 0.
pub(crate) fn time_index(progress: f64, time_bins: usize) -> usize {
    let raw = ((1.0 - progress) * time_bins as f64).floor() as i64;
    raw.clamp(0, time_bins as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrogram::{FREQ_BINS, TIME_BINS};

    fn flat_matrix(value: f32) -> SpectrogramMatrix {
        SpectrogramMatrix::from_values(vec![value; TIME_BINS * FREQ_BINS])
    }

    fn running_clock() -> PlaybackClock {
        PlaybackClock {
            start_time: 100.0,
            duration: 10.0,
            playing: true,
        }
    }

    #[test]
    fn progress_at_half_duration() {
        let clock = running_clock();
        assert_eq!(clock.progress(105.0), Some(0.5));
        assert_eq!(time_index(0.5, TIME_BINS), TIME_BINS / 2);
    }

    #[test]
    fn clock_past_duration_is_idle() {
        let clock = running_clock();
        assert_eq!(clock.progress(110.5), None);

        let scanner = PlaybackScanner::new(10.0);
        assert!(scanner.scan(&clock, 110.5, &flat_matrix(1.0)).is_none());
    }

    #[test]
    fn stopped_clock_hides_overlay() {
        let mut clock = running_clock();
        clock.playing = false;
        let scanner = PlaybackScanner::new(10.0);
        assert!(scanner.scan(&clock, 101.0, &flat_matrix(1.0)).is_none());
    }

    #[test]
    fn time_index_is_clamped_at_both_ends() {
        assert_eq!(time_index(0.0, TIME_BINS), TIME_BINS - 1);
        assert_eq!(time_index(1.0, TIME_BINS), 0);
        assert_eq!(time_index(1.5, TIME_BINS), 0);
    }

    #[test]
    fn curtain_tops_share_crest_positions() {
        let scanner = PlaybackScanner::new(10.0);
        let overlay = scanner.overlay_at(0.25, &flat_matrix(3.0));

        assert_eq!(overlay.crest.len(), SCAN_POINTS);
        assert_eq!(overlay.curtain_positions.len(), 2 * SCAN_POINTS);
        for (p, &top) in overlay.crest.iter().enumerate() {
            assert_eq!(overlay.curtain_positions[2 * p], top);
            let bottom = overlay.curtain_positions[2 * p + 1];
            assert_eq!(bottom[1], 0.0);
            assert_eq!(bottom[0], top[0]);
            assert_eq!(bottom[2], top[2]);
        }
    }

    #[test]
    fn crest_height_matches_terrain_normalization() {
        // Uniform matrix: every crest point sits at the headroom height
        // (plus the z-fight lift) just like the terrain ridge.
        let size = 10.0;
        let scanner = PlaybackScanner::new(size);
        let overlay = scanner.overlay_at(0.5, &flat_matrix(42.0));

        let expected = size * HEIGHT_HEADROOM + size * 0.004;
        for point in &overlay.crest {
            assert!((point[1] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn crest_spans_the_frequency_axis() {
        let size = 10.0;
        let scanner = PlaybackScanner::new(size);
        let overlay = scanner.overlay_at(0.5, &flat_matrix(1.0));
        assert_eq!(overlay.crest[0][0], 0.0);
        assert!((overlay.crest[SCAN_POINTS - 1][0] - size).abs() < 1e-5);
    }
}
