//! The export driver: timeline → compositor → sink.
//!
//! Walks the merged timeline in time order, keeps only frames that differ
//! from their predecessor, and closes each kept frame out with the exact
//! time until the next kept one.

use std::path::Path;

use crate::{
    atlas::TileAtlas,
    encode::{AnimationSink, SinkConfig},
    encode_gif::{GifSink, GifSinkOpts},
    error::{TilecycleError, TilecycleResult},
    model::TileMap,
    render::{Compositor, FrameRgba, TileAnchor},
    timeline::{SubstitutionMap, Timeline},
};

/// Options controlling one export.
#[derive(Clone, Copy, Debug)]
pub struct ExportOpts {
    /// Ceiling on the number of timeline instants; exceeded timelines fail
    /// with [`TilecycleError::TooManyFrames`] before any compositing.
    pub max_frames: usize,
    /// Placement of tile art larger than the map's cell size.
    pub anchor: TileAnchor,
    /// Request infinite looping in the output file.
    pub loop_forever: bool,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            max_frames: 1024,
            anchor: TileAnchor::Bottom,
            loop_forever: true,
        }
    }
}

/// Export statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Frames handed to the sink.
    pub frames_emitted: u64,
    /// Timeline instants folded into their predecessor's hold duration.
    pub frames_elided: u64,
    /// Length of the repeating cycle in milliseconds; 0 for a static map.
    pub period_ms: u64,
}

/// Export `map` as an animation, reading tileset atlases relative to
/// `base_dir` and streaming deduplicated frames into `sink`.
///
/// Errors are detected eagerly: contract validation first, then the
/// unbounded-map check, then the timeline ceiling — all before any atlas
/// file is opened or a pixel is composited.
#[tracing::instrument(skip(map, sink), fields(layers = map.layers.len()))]
pub fn export(
    map: &TileMap,
    base_dir: impl AsRef<Path> + std::fmt::Debug,
    opts: &ExportOpts,
    sink: &mut dyn AnimationSink,
) -> TilecycleResult<ExportStats> {
    map.validate()?;
    if map.infinite {
        return Err(TilecycleError::bounds(
            "cannot export an infinite map: canvas size is unbounded",
        ));
    }
    let timeline = Timeline::build(map, opts.max_frames)?;
    let atlas = TileAtlas::load(map, base_dir)?;
    run(map, &atlas, &timeline, opts, sink)
}

/// Like [`export`], but with a pre-sliced atlas. No file I/O besides the
/// sink's own output.
pub fn export_with_atlas(
    map: &TileMap,
    atlas: &TileAtlas,
    opts: &ExportOpts,
    sink: &mut dyn AnimationSink,
) -> TilecycleResult<ExportStats> {
    map.validate()?;
    if map.infinite {
        return Err(TilecycleError::bounds(
            "cannot export an infinite map: canvas size is unbounded",
        ));
    }
    let timeline = Timeline::build(map, opts.max_frames)?;
    run(map, atlas, &timeline, opts, sink)
}

/// One-call convenience: export `map` to an animated GIF at `out_path`.
pub fn export_gif_file(
    map: &TileMap,
    base_dir: impl AsRef<Path> + std::fmt::Debug,
    opts: &ExportOpts,
    out_path: impl Into<std::path::PathBuf>,
) -> TilecycleResult<ExportStats> {
    let mut sink = GifSink::new(GifSinkOpts::new(out_path));
    export(map, base_dir, opts, &mut sink)
}

fn run(
    map: &TileMap,
    atlas: &TileAtlas,
    timeline: &Timeline,
    opts: &ExportOpts,
    sink: &mut dyn AnimationSink,
) -> TilecycleResult<ExportStats> {
    let mut compositor = Compositor::new(map, atlas, opts.anchor)?;
    let (width, height) = compositor.canvas_size();
    sink.begin(SinkConfig {
        width,
        height,
        loop_forever: opts.loop_forever,
    })?;

    if timeline.is_static() {
        // No animated tile in use: one frame, hold unconstrained.
        let (frame, _) = compositor.composite(&SubstitutionMap::new())?;
        sink.push_frame(frame, 0)?;
        sink.end()?;
        return Ok(ExportStats {
            frames_emitted: 1,
            frames_elided: 0,
            period_ms: 0,
        });
    }

    tracing::debug!(
        instants = timeline.instants.len(),
        period_ms = timeline.period_ms,
        "compositing timeline"
    );

    let mut stats = ExportStats {
        period_ms: timeline.period_ms,
        ..ExportStats::default()
    };

    // The frame currently accumulating hold time; flushed when the next
    // distinct frame starts.
    let mut pending: Option<(FrameRgba, u64)> = None;

    for (i, instant) in timeline.instants.iter().enumerate() {
        let next_offset = timeline
            .instants
            .get(i + 1)
            .map_or(timeline.period_ms, |next| next.offset_ms);
        let hold_ms = next_offset - instant.offset_ms;

        let (frame, changed) = compositor.composite(&instant.changes)?;
        let keep = match &pending {
            // The first instant is always kept.
            None => true,
            // `changed` tracks resolved gids; distinct gids can still carry
            // identical art, so confirm against the pixels actually pending.
            Some((prev, _)) => changed && frame.data != prev.data,
        };

        if keep {
            if let Some((prev, prev_hold)) = pending.take() {
                sink.push_frame(&prev, prev_hold)?;
            }
            pending = Some((frame.clone(), hold_ms));
            stats.frames_emitted += 1;
        } else if let Some((_, prev_hold)) = pending.as_mut() {
            *prev_hold += hold_ms;
            stats.frames_elided += 1;
        }
    }

    if let Some((prev, prev_hold)) = pending.take() {
        sink.push_frame(&prev, prev_hold)?;
    }
    sink.end()?;

    tracing::debug!(
        emitted = stats.frames_emitted,
        elided = stats.frames_elided,
        "export finished"
    );
    Ok(stats)
}
