//! Global animation timeline construction.
//!
//! Every animated tile carries its own clip with its own total duration; the
//! exported file must repeat exactly, so the global period is the LCM of all
//! clip durations actually referenced by layer data. Within one period, the
//! timeline keeps only the instants at which at least one tile's displayed
//! gid changes, each with the gid substitutions taking effect right then.

use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{TilecycleError, TilecycleResult},
    math::checked_lcm_all,
    model::{Gid, TileMap},
};

/// gid → replacement gid, valid at one instant of the global timeline.
pub type SubstitutionMap = BTreeMap<Gid, Gid>;

/// One point on the global timeline: the substitutions that take effect at
/// `offset_ms`. Only gids whose displayed tile changes here are present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineInstant {
    /// Offset from the start of the period, `0 <= offset_ms < period_ms`.
    pub offset_ms: u64,
    pub changes: SubstitutionMap,
}

/// The merged global timeline of a map.
///
/// `instants` is strictly increasing in `offset_ms` and always starts at 0
/// when non-empty (every in-use clip defines its displayed tile at offset 0).
/// An empty timeline means no animated tile is in use and the map renders as
/// a single static frame.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    pub instants: Vec<TimelineInstant>,
    /// Length of the fully repeating cycle in milliseconds; 0 when static.
    pub period_ms: u64,
}

impl Timeline {
    /// `true` when the map has no in-use animated tiles.
    pub fn is_static(&self) -> bool {
        self.instants.is_empty()
    }

    /// Merge the clips of every animated tile referenced by `map`'s layers
    /// into one global timeline.
    ///
    /// Fails with [`TilecycleError::TooManyFrames`] when the merged timeline
    /// would hold more than `max_frames` instants. The ceiling is enforced
    /// here, before any atlas slicing or compositing happens, so a degenerate
    /// LCM (many large mutually-prime clip durations) never costs pixel work.
    pub fn build(map: &TileMap, max_frames: usize) -> TilecycleResult<Self> {
        let referenced = referenced_gids(map);

        // Per-tile sub-timelines: (gid, [(offset, target)], clip duration).
        let mut clips: Vec<(Gid, Vec<(u64, Gid)>, u64)> = Vec::new();
        for ts in &map.tilesets {
            for anim in &ts.animations {
                let gid = Gid(ts.first_gid + anim.local_id);
                if !referenced.contains(&gid) {
                    continue;
                }

                let mut offsets: Vec<(u64, Gid)> = Vec::with_capacity(anim.frames.len());
                let mut at = 0u64;
                for frame in &anim.frames {
                    let target = Gid(ts.first_gid + frame.tile_id);
                    // A zero-duration frame is never visible: the next frame
                    // lands on the same offset and supersedes it.
                    match offsets.last_mut() {
                        Some((offset, prev_target)) if *offset == at => *prev_target = target,
                        _ => offsets.push((at, target)),
                    }
                    at += u64::from(frame.duration_ms);
                }
                // A clip with no frames or zero total duration has no period
                // to contribute.
                if at == 0 {
                    continue;
                }
                // A trailing zero-duration frame sits exactly on the wrap
                // point; the next cycle's first frame supersedes it.
                offsets.retain(|(offset, _)| *offset < at);
                clips.push((gid, offsets, at));
            }
        }

        if clips.is_empty() {
            return Ok(Self::default());
        }

        let period_ms = checked_lcm_all(clips.iter().map(|(_, _, d)| *d))
            .ok_or(TilecycleError::TooManyFrames { max_frames })?;

        // A single clip's offsets are strictly increasing, so `reps * len`
        // is a lower bound on the merged instant count. Checking it first
        // keeps degenerate periods from materializing a huge schedule at all.
        for (_, offsets, duration) in &clips {
            let bound = u128::from(period_ms / duration) * offsets.len() as u128;
            if bound > max_frames as u128 {
                return Err(TilecycleError::TooManyFrames { max_frames });
            }
        }

        let mut schedule: BTreeMap<u64, SubstitutionMap> = BTreeMap::new();
        for (gid, offsets, duration) in &clips {
            let reps = period_ms / duration;
            for k in 0..reps {
                let shift = k * duration;
                for (offset, target) in offsets {
                    schedule.entry(shift + offset).or_default().insert(*gid, *target);
                }
            }
            if schedule.len() > max_frames {
                return Err(TilecycleError::TooManyFrames { max_frames });
            }
        }

        let instants = schedule
            .into_iter()
            .map(|(offset_ms, changes)| TimelineInstant { offset_ms, changes })
            .collect();

        Ok(Self {
            instants,
            period_ms,
        })
    }
}

fn referenced_gids(map: &TileMap) -> HashSet<Gid> {
    map.layers
        .iter()
        .flat_map(|layer| layer.data.iter().copied())
        .filter(|gid| !gid.is_empty())
        .collect()
}
