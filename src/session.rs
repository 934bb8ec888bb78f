use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::audio::decode::PcmBuffer;
use crate::audio::source::SourceLocator;
use crate::audio::spectrogram::SpectrogramMatrix;
use crate::audio::{self, LoadError};
use crate::scene::scanner::{PlaybackClock, PlaybackScanner, ScanOverlay};

/// Immutable per-frame view of the session, handed to the presentation
/// layer by `tick`.
pub struct RenderState<'a> {
    pub matrix: Option<&'a SpectrogramMatrix>,
    /// Bumped once per published clip; the renderer re-uploads terrain
    /// buffers when it changes.
    pub revision: u64,
    pub overlay: Option<ScanOverlay>,
}

struct LoadOutcome {
    generation: u64,
    result: Result<(PcmBuffer, SpectrogramMatrix), LoadError>,
}

/// Owns the decode/analysis lifecycle and the playback clock.
///
/// Loads run on background threads, one per request. Each request bumps a
/// generation counter; a completion carrying a stale generation is
/// discarded, so overlapping loads can never publish out of order. The
/// published PCM and matrix are immutable snapshots shared with readers.
pub struct AnalyzerSession {
    generation: u64,
    revision: u64,
    pcm: Option<Arc<PcmBuffer>>,
    matrix: Option<Arc<SpectrogramMatrix>>,
    clock: Option<PlaybackClock>,
    scanner: PlaybackScanner,
    outcome_tx: Sender<LoadOutcome>,
    outcome_rx: Receiver<LoadOutcome>,
    last_error: Option<LoadError>,
}

impl AnalyzerSession {
    pub fn new(volume_size: f32) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            generation: 0,
            revision: 0,
            pcm: None,
            matrix: None,
            clock: None,
            scanner: PlaybackScanner::new(volume_size),
            outcome_tx,
            outcome_rx,
            last_error: None,
        }
    }

    /// Kick off a background fetch/decode/analyze for a new clip. The
    /// previous visualization stays published until the result lands.
    pub fn request_load(&mut self, locator: SourceLocator) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.outcome_tx.clone();

        log::info!("Loading {locator} (generation {generation})");
        std::thread::spawn(move || {
            let result = audio::load_clip(&locator);
            // The session may have moved on; it decides what is current.
            let _ = tx.send(LoadOutcome { generation, result });
        });
    }

    /// Advance the session one frame: drain finished loads, advance the
    /// playback clock, and derive the scan overlay for `now`.
    pub fn tick(&mut self, now: f64) -> RenderState<'_> {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.publish(outcome);
        }

        if let Some(clock) = self.clock.as_mut() {
            if clock.playing && now - clock.start_time > clock.duration {
                clock.playing = false;
                log::debug!("Playback finished");
            }
        }

        let overlay = match (self.clock.as_ref(), self.matrix.as_deref()) {
            (Some(clock), Some(matrix)) => self.scanner.scan(clock, now, matrix),
            _ => None,
        };

        RenderState {
            matrix: self.matrix.as_deref(),
            revision: self.revision,
            overlay,
        }
    }

    /// Begin playback of the loaded clip at `now`. No-op without a clip;
    /// calling again restarts the single timeline rather than layering a
    /// second one.
    pub fn play(&mut self, now: f64) {
        let Some(pcm) = self.pcm.as_ref() else {
            log::warn!("Play requested with no clip loaded");
            return;
        };
        self.clock = Some(PlaybackClock {
            start_time: now,
            duration: pcm.duration(),
            playing: true,
        });
    }

    /// Stop playback. Idempotent: stopping an already-stopped session is
    /// a no-op.
    pub fn stop(&mut self) {
        if let Some(clock) = self.clock.as_mut() {
            clock.playing = false;
        }
    }

    pub fn has_clip(&self) -> bool {
        self.matrix.is_some()
    }

    pub fn duration(&self) -> Option<f64> {
        self.pcm.as_ref().map(|pcm| pcm.duration())
    }

    pub fn take_error(&mut self) -> Option<LoadError> {
        self.last_error.take()
    }

    fn publish(&mut self, outcome: LoadOutcome) {
        if outcome.generation != self.generation {
            log::debug!(
                "Discarding stale load result (generation {} != {})",
                outcome.generation,
                self.generation
            );
            return;
        }

        match outcome.result {
            Ok((pcm, matrix)) => {
                // A new clip cancels any running playback.
                self.clock = None;
                log::info!(
                    "Published clip: {:.2}s, peak energy {:.1}",
                    pcm.duration(),
                    matrix.peak()
                );
                self.pcm = Some(Arc::new(pcm));
                self.matrix = Some(Arc::new(matrix));
                self.revision += 1;
            }
            Err(err) => {
                log::warn!("Load failed, keeping previous visualization: {err}");
                self.last_error = Some(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrogram::{FREQ_BINS, TIME_BINS};

    fn clip(fill: f32, seconds: f64) -> (PcmBuffer, SpectrogramMatrix) {
        let pcm = PcmBuffer {
            samples: vec![0.0; (seconds * 44_100.0) as usize],
            sample_rate: 44_100,
        };
        let matrix = SpectrogramMatrix::from_values(vec![fill; TIME_BINS * FREQ_BINS]);
        (pcm, matrix)
    }

    #[test]
    fn stale_generation_never_overwrites_current() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 2;

        // B (generation 2) lands first, then the slow A (generation 1).
        session.publish(LoadOutcome { generation: 2, result: Ok(clip(2.0, 1.0)) });
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(1.0, 9.0)) });

        let state = session.tick(0.0);
        assert_eq!(state.matrix.unwrap().at(0, 0), 2.0);
        assert_eq!(session.duration(), Some(1.0));
    }

    #[test]
    fn stale_results_are_dropped_from_the_channel_too() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 2;
        let tx = session.outcome_tx.clone();
        tx.send(LoadOutcome { generation: 1, result: Ok(clip(1.0, 1.0)) }).unwrap();
        tx.send(LoadOutcome { generation: 2, result: Ok(clip(2.0, 1.0)) }).unwrap();

        let state = session.tick(0.0);
        assert_eq!(state.matrix.unwrap().at(5, 5), 2.0);
    }

    #[test]
    fn failed_load_keeps_previous_state() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 1;
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(7.0, 2.0)) });

        session.generation = 2;
        session.publish(LoadOutcome {
            generation: 2,
            result: Err(LoadError::EmptyInput),
        });

        assert!(session.has_clip());
        let state = session.tick(0.0);
        assert_eq!(state.matrix.unwrap().at(0, 0), 7.0);
        assert!(matches!(session.take_error(), Some(LoadError::EmptyInput)));
        assert!(session.take_error().is_none());
    }

    #[test]
    fn play_without_clip_is_a_noop() {
        let mut session = AnalyzerSession::new(10.0);
        session.play(0.0);
        assert!(session.clock.is_none());
        let state = session.tick(0.5);
        assert!(state.overlay.is_none());
    }

    #[test]
    fn play_twice_restarts_the_clock() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 1;
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(1.0, 10.0)) });

        session.play(1.0);
        session.play(2.0);

        let clock = session.clock.unwrap();
        assert_eq!(clock.start_time, 2.0);
        assert!(clock.playing);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = AnalyzerSession::new(10.0);
        session.stop();

        session.generation = 1;
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(1.0, 10.0)) });
        session.play(0.0);
        session.stop();
        session.stop();
        assert!(!session.clock.unwrap().playing);
        assert!(session.tick(1.0).overlay.is_none());
    }

    #[test]
    fn playback_expires_exactly_once_and_hides_overlay() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 1;
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(1.0, 1.0)) });

        session.play(0.0);
        assert!(session.tick(0.5).overlay.is_some());

        assert!(session.tick(1.01).overlay.is_none());
        assert!(!session.clock.unwrap().playing);
        assert!(session.tick(1.02).overlay.is_none());
    }

    #[test]
    fn new_clip_cancels_running_playback() {
        let mut session = AnalyzerSession::new(10.0);
        session.generation = 1;
        session.publish(LoadOutcome { generation: 1, result: Ok(clip(1.0, 10.0)) });
        session.play(0.0);

        session.generation = 2;
        session.publish(LoadOutcome { generation: 2, result: Ok(clip(2.0, 5.0)) });

        assert!(session.clock.is_none());
        assert!(session.tick(0.1).overlay.is_none());
    }

    #[test]
    fn load_failure_surfaces_through_background_channel() {
        let mut session = AnalyzerSession::new(10.0);
        session.request_load(SourceLocator::parse("/definitely/not/here.wav"));

        let mut error = None;
        for _ in 0..200 {
            session.tick(0.0);
            error = session.take_error();
            if error.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(matches!(error, Some(LoadError::Fetch(_))));
        assert!(!session.has_clip());
    }
}
