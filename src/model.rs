use crate::error::{TilecycleError, TilecycleResult};

/// Global tile id. Map-wide unique; resolves to exactly one tileset + local
/// tile index via the tileset's `first_gid` range. `Gid::EMPTY` marks an
/// empty layer cell and is never rendered.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Gid(pub u32);

impl Gid {
    /// The "no tile here" sentinel.
    pub const EMPTY: Gid = Gid(0);

    /// Return `true` for the empty-cell sentinel.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A parsed tile map, built by an external loader. Read-only to this crate
/// for the duration of one export.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TileMap {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Nominal tile width in pixels.
    pub tile_width: u32,
    /// Nominal tile height in pixels.
    pub tile_height: u32,
    /// Unbounded maps cannot be exported (no canvas size).
    pub infinite: bool,
    pub tilesets: Vec<Tileset>,
    /// Layers in bottom-to-top paint order.
    pub layers: Vec<Layer>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Tileset {
    /// First global tile id owned by this tileset.
    pub first_gid: u32,
    /// Tiles per atlas row.
    pub columns: u32,
    /// Total tiles in the atlas.
    pub tile_count: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Outer border of the atlas image, in pixels.
    pub margin: u32,
    /// Gap between adjacent tiles, in pixels.
    pub spacing: u32,
    /// Atlas image path, relative to the caller-supplied base directory.
    pub image_source: String,
    /// Animation clips; only tiles that actually have one appear here.
    pub animations: Vec<AnimatedTile>,
}

impl Tileset {
    /// Half-open gid range `[first_gid, first_gid + tile_count)`.
    pub fn contains_gid(&self, gid: Gid) -> bool {
        gid.0 >= self.first_gid && gid.0 < self.first_gid + self.tile_count
    }
}

/// An animated tile definition: the tile at `local_id` cycles through
/// `frames`, each substituting another local tile for `duration_ms`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnimatedTile {
    pub local_id: u32,
    pub frames: Vec<AnimationFrame>,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnimationFrame {
    /// Local id of the tile shown during this frame.
    pub tile_id: u32,
    /// How long this frame is shown, in milliseconds.
    pub duration_ms: u32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    /// Layer width in tiles.
    pub width: u32,
    /// Layer height in tiles.
    pub height: u32,
    /// Row-major cell gids, length `width * height`.
    pub data: Vec<Gid>,
}

impl Layer {
    /// Cell gid at `(col, row)`, or `Gid::EMPTY` outside the layer.
    pub fn gid_at(&self, col: u32, row: u32) -> Gid {
        if col >= self.width || row >= self.height {
            return Gid::EMPTY;
        }
        self.data[(row * self.width + col) as usize]
    }
}

impl TileMap {
    /// Fail-fast contract checks on inputs the external loader guarantees.
    ///
    /// This is not format validation; it only rejects object graphs that
    /// would make the compositor misbehave (mismatched layer data length,
    /// a tileset grid that does not divide evenly, gid space anomalies).
    pub fn validate(&self) -> TilecycleResult<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(TilecycleError::validation(
                "map tile_width/tile_height must be > 0",
            ));
        }

        for (i, ts) in self.tilesets.iter().enumerate() {
            if ts.first_gid == 0 {
                return Err(TilecycleError::validation(format!(
                    "tileset #{i} has first_gid 0, which collides with the empty-cell sentinel"
                )));
            }
            if ts.columns == 0 {
                return Err(TilecycleError::validation(format!(
                    "tileset #{i} has 0 columns"
                )));
            }
            if ts.tile_count % ts.columns != 0 {
                return Err(TilecycleError::validation(format!(
                    "tileset #{i} tile_count {} is not divisible by columns {}",
                    ts.tile_count, ts.columns
                )));
            }
            if ts.tile_width == 0 || ts.tile_height == 0 {
                return Err(TilecycleError::validation(format!(
                    "tileset #{i} has zero tile dimensions"
                )));
            }
        }

        for (i, layer) in self.layers.iter().enumerate() {
            let expected = (layer.width as usize) * (layer.height as usize);
            if layer.data.len() != expected {
                return Err(TilecycleError::validation(format!(
                    "layer #{i} has {} cells, expected {expected}",
                    layer.data.len()
                )));
            }
        }

        Ok(())
    }
}
