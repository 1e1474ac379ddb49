//! Encoding sinks.
//!
//! Sinks consume deduplicated frames in timeline order together with their
//! hold durations; the assembler drives them through `begin` / `push_frame` /
//! `end`.

use crate::error::TilecycleResult;
use crate::render::FrameRgba;

/// Configuration provided to an [`AnimationSink`] before any frame is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Whether the animation should loop forever.
    pub loop_forever: bool,
}

/// Sink contract for consuming composited frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing timeline
/// order, each frame already deduplicated against its predecessor and carrying
/// its final hold duration. A static export pushes exactly one frame with a
/// hold of 0.
pub trait AnimationSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> TilecycleResult<()>;
    /// Push one frame held for `hold_ms` milliseconds.
    fn push_frame(&mut self, frame: &FrameRgba, hold_ms: u64) -> TilecycleResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> TilecycleResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    /// Frames in timeline order with their hold durations.
    pub frames: Vec<(FrameRgba, u64)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Sum of all hold durations pushed so far.
    pub fn total_hold_ms(&self) -> u64 {
        self.frames.iter().map(|(_, hold)| hold).sum()
    }

    /// Whether `end` has been called since the last `begin`.
    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl AnimationSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> TilecycleResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRgba, hold_ms: u64) -> TilecycleResult<()> {
        self.frames.push((frame.clone(), hold_ms));
        Ok(())
    }

    fn end(&mut self) -> TilecycleResult<()> {
        self.ended = true;
        Ok(())
    }
}
