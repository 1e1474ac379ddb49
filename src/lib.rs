//! Tilecycle renders animated tile maps into exactly-repeating animated
//! images.
//!
//! Given a parsed map (layers of gid references, tilesets with per-tile
//! animation clips), the pipeline:
//!
//! - slices tileset atlases into per-tile rasters ([`TileAtlas`])
//! - merges every in-use clip into one global timeline whose period is the
//!   LCM of the clip durations ([`Timeline`])
//! - composites one frame per timeline instant, repainting only the cells
//!   that changed ([`Compositor`])
//! - deduplicates identical consecutive frames and streams the survivors
//!   with exact hold durations into an [`AnimationSink`] such as [`GifSink`]
//!
//! The one-call entry point is [`export_gif_file`]; [`export`] and
//! [`export_with_atlas`] expose the sink seam for other containers and for
//! tests.
#![forbid(unsafe_code)]

pub mod atlas;
pub mod composite;
pub mod encode;
pub mod encode_gif;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod timeline;

mod math;

pub use atlas::{SlicedTileset, TileAtlas, TileImage, slice_tileset};
pub use encode::{AnimationSink, InMemorySink, SinkConfig};
pub use encode_gif::{GifSink, GifSinkOpts};
pub use error::{TilecycleError, TilecycleResult};
pub use model::{AnimatedTile, AnimationFrame, Gid, Layer, TileMap, Tileset};
pub use pipeline::{ExportOpts, ExportStats, export, export_gif_file, export_with_atlas};
pub use render::{Compositor, FrameRgba, TileAnchor};
pub use timeline::{SubstitutionMap, Timeline, TimelineInstant};
