use std::path::Path;

use anyhow::Context as _;

use crate::{
    composite::premultiply_rgba8_in_place,
    error::{TilecycleError, TilecycleResult},
    model::{Gid, TileMap, Tileset},
};

/// One sliced tile raster in premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// All tiles of one tileset, indexed by local tile id.
#[derive(Debug)]
pub struct SlicedTileset {
    first_gid: u32,
    tiles: Vec<TileImage>,
}

impl SlicedTileset {
    /// Number of sliced tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Owned per-tile rasters for every tileset of a map, addressable by gid.
///
/// The atlas is built once per export and borrowed by the compositor; there
/// is no process-wide cache behind it.
#[derive(Debug, Default)]
pub struct TileAtlas {
    tilesets: Vec<SlicedTileset>,
    max_tile_width: u32,
    max_tile_height: u32,
}

/// Slice a tileset's atlas image into per-tile rasters.
///
/// Tiles are laid out row-major starting at `(margin, margin)`; each
/// subsequent tile is offset by `tile_size + spacing` in its axis.
pub fn slice_tileset(ts: &Tileset, atlas: &image::RgbaImage) -> TilecycleResult<SlicedTileset> {
    if ts.columns == 0 || ts.tile_count % ts.columns != 0 {
        return Err(TilecycleError::validation(format!(
            "tileset '{}': tile_count {} does not divide into {} columns",
            ts.image_source, ts.tile_count, ts.columns
        )));
    }

    let rows = ts.tile_count / ts.columns;
    let required_w = ts.margin + ts.columns * ts.tile_width + ts.columns.saturating_sub(1) * ts.spacing;
    let required_h = ts.margin + rows * ts.tile_height + rows.saturating_sub(1) * ts.spacing;
    if atlas.width() < required_w || atlas.height() < required_h {
        return Err(TilecycleError::validation(format!(
            "tileset '{}': atlas is {}x{} but the tile grid needs at least {}x{}",
            ts.image_source,
            atlas.width(),
            atlas.height(),
            required_w,
            required_h
        )));
    }

    let mut tiles = Vec::with_capacity(ts.tile_count as usize);
    for row in 0..rows {
        for col in 0..ts.columns {
            let x = ts.margin + col * (ts.tile_width + ts.spacing);
            let y = ts.margin + row * (ts.tile_height + ts.spacing);
            let view = image::imageops::crop_imm(atlas, x, y, ts.tile_width, ts.tile_height);
            let mut data = view.to_image().into_raw();
            premultiply_rgba8_in_place(&mut data);
            tiles.push(TileImage {
                width: ts.tile_width,
                height: ts.tile_height,
                data,
            });
        }
    }

    Ok(SlicedTileset {
        first_gid: ts.first_gid,
        tiles,
    })
}

impl TileAtlas {
    /// Assemble an atlas from pre-sliced tilesets.
    pub fn new(tilesets: Vec<SlicedTileset>) -> Self {
        let mut max_tile_width = 0;
        let mut max_tile_height = 0;
        for ts in &tilesets {
            for tile in &ts.tiles {
                max_tile_width = max_tile_width.max(tile.width);
                max_tile_height = max_tile_height.max(tile.height);
            }
        }
        Self {
            tilesets,
            max_tile_width,
            max_tile_height,
        }
    }

    /// Read and slice every tileset atlas of `map`.
    ///
    /// Atlas image paths are resolved relative to `base_dir`; any decodable
    /// raster format is accepted and converted to RGBA (opaque alpha is
    /// synthesized for formats without an alpha channel).
    pub fn load(map: &TileMap, base_dir: impl AsRef<Path>) -> TilecycleResult<Self> {
        let base_dir = base_dir.as_ref();
        let mut tilesets = Vec::with_capacity(map.tilesets.len());
        for ts in &map.tilesets {
            let path = base_dir.join(&ts.image_source);
            let img = image::open(&path)
                .with_context(|| format!("open tileset atlas '{}'", path.display()))?;
            tilesets.push(slice_tileset(ts, &img.to_rgba8())?);
        }
        Ok(Self::new(tilesets))
    }

    /// Resolve a gid to its sliced tile raster. `Gid::EMPTY` and gids outside
    /// every tileset's range yield `None`.
    pub fn get(&self, gid: Gid) -> Option<&TileImage> {
        if gid.is_empty() {
            return None;
        }
        self.tilesets.iter().find_map(|ts| {
            let idx = gid.0.checked_sub(ts.first_gid)? as usize;
            ts.tiles.get(idx)
        })
    }

    /// Widest sliced tile, in pixels.
    pub fn max_tile_width(&self) -> u32 {
        self.max_tile_width
    }

    /// Tallest sliced tile, in pixels. The compositor uses this to bound how
    /// far an oversized tile can reach above its home cell.
    pub fn max_tile_height(&self) -> u32 {
        self.max_tile_height
    }
}
