//! The single playback clock the render loop derives every timing decision
//! from: slide switching, caption windows and frame indices all read the same
//! timebase, so they cannot drift apart.

/// Monotonic media clock injected into the export loop.
pub trait PlaybackClock {
    /// Current position on the media timeline, in seconds.
    fn now_secs(&self) -> f64;
    /// Advance by one frame duration after a frame is emitted.
    fn tick(&mut self, frame_duration_secs: f64);
}

/// Deterministic offline clock: time is frames-emitted times frame duration,
/// independent of wall time. An export of N frames always observes the exact
/// same N timestamps.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncoderClock {
    ticks: u64,
    now_secs: f64,
}

impl EncoderClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackClock for EncoderClock {
    fn now_secs(&self) -> f64 {
        self.now_secs
    }

    fn tick(&mut self, frame_duration_secs: f64) {
        // Multiply instead of accumulating so repeated ticks do not drift.
        self.ticks += 1;
        self.now_secs = self.ticks as f64 * frame_duration_secs;
    }
}
