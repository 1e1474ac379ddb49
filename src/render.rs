//! Incremental tile-map frame compositing.
//!
//! The compositor owns one canvas for the lifetime of an export and repaints
//! only the grid cells whose tile stack changed since the previous instant.
//! Damage is tracked at canvas-grid-cell granularity: for every layer cell
//! whose resolved gid changed, the pixel extents of both the old and the new
//! tile are marked, expanded so oversized tiles reaching into a cell from a
//! neighboring one are repainted too.

use std::collections::BTreeMap;

use crate::{
    atlas::{TileAtlas, TileImage},
    composite::over,
    error::{TilecycleError, TilecycleResult},
    model::{Gid, TileMap},
    timeline::SubstitutionMap,
};

/// A composited frame as RGBA8 pixels.
///
/// Frames are premultiplied alpha; the `premultiplied` flag makes this
/// explicit at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// Anchor policy for tile art larger than the map's nominal cell size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileAnchor {
    /// Excess height grows upward from the cell's bottom edge (tall sprites
    /// stand on their cell).
    #[default]
    Bottom,
    /// Tile art hangs down from the cell's top edge.
    Top,
}

/// Marks a layer cell whose backing pixels have never been rendered.
const UNRENDERED: Gid = Gid(u32::MAX);

/// Renders composited frames for successive timeline instants.
#[derive(Debug)]
pub struct Compositor<'a> {
    map: &'a TileMap,
    atlas: &'a TileAtlas,
    anchor: TileAnchor,
    canvas: FrameRgba,
    /// Accumulated gid substitutions for the current instant.
    active: BTreeMap<Gid, Gid>,
    /// Per layer, per cell: the resolved gid whose raster backs the canvas.
    cell_gids: Vec<Vec<Gid>>,
    /// Scratch damage grid, `map.width * map.height`.
    damage: Vec<bool>,
}

impl<'a> Compositor<'a> {
    /// Create a compositor with a blank canvas sized
    /// `map.width * tile_width x map.height * tile_height`.
    ///
    /// Fails with [`TilecycleError::Bounds`] for infinite maps, whose canvas
    /// size cannot be computed.
    pub fn new(
        map: &'a TileMap,
        atlas: &'a TileAtlas,
        anchor: TileAnchor,
    ) -> TilecycleResult<Self> {
        if map.infinite {
            return Err(TilecycleError::bounds(
                "cannot composite an infinite map: canvas size is unbounded",
            ));
        }

        let width = u64::from(map.width) * u64::from(map.tile_width);
        let height = u64::from(map.height) * u64::from(map.tile_height);
        if width == 0 || height == 0 || width > u64::from(u32::MAX) || height > u64::from(u32::MAX)
        {
            return Err(TilecycleError::bounds(format!(
                "canvas size {width}x{height} is not representable"
            )));
        }
        let (width, height) = (width as u32, height as u32);

        let cell_gids = map
            .layers
            .iter()
            .map(|layer| vec![UNRENDERED; (layer.width as usize) * (layer.height as usize)])
            .collect();

        Ok(Self {
            map,
            atlas,
            anchor,
            canvas: FrameRgba {
                width,
                height,
                data: vec![0; (width as usize) * (height as usize) * 4],
                premultiplied: true,
            },
            active: BTreeMap::new(),
            cell_gids,
            damage: vec![false; (map.width as usize) * (map.height as usize)],
        })
    }

    /// Output canvas size in pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width, self.canvas.height)
    }

    /// Apply a substitution fragment and composite the frame for the new
    /// instant. Returns the canvas and whether any cell's resolved gid
    /// changed since the previous call.
    ///
    /// The first call renders every cell; later calls repaint only damaged
    /// cells, and an instant that changes nothing returns the previous
    /// canvas with zero pixel work.
    pub fn composite(
        &mut self,
        changes: &SubstitutionMap,
    ) -> TilecycleResult<(&FrameRgba, bool)> {
        for (gid, target) in changes {
            self.active.insert(*gid, *target);
        }

        self.damage.fill(false);
        let mut any_damage = false;

        let map = self.map;
        for (li, layer) in map.layers.iter().enumerate() {
            for row in 0..layer.height {
                for col in 0..layer.width {
                    let idx = (row * layer.width + col) as usize;
                    let raw = layer.data[idx];
                    let resolved = self.resolve(raw);
                    let prev = self.cell_gids[li][idx];
                    if resolved == prev {
                        continue;
                    }
                    self.mark_damage(col, row, prev)?;
                    self.mark_damage(col, row, resolved)?;
                    self.cell_gids[li][idx] = resolved;
                    any_damage = true;
                }
            }
        }

        if !any_damage {
            return Ok((&self.canvas, false));
        }

        self.repaint_damaged_cells()?;
        Ok((&self.canvas, true))
    }

    fn resolve(&self, gid: Gid) -> Gid {
        self.active.get(&gid).copied().unwrap_or(gid)
    }

    /// Pixel placement of `tile` for the layer cell `(col, row)`.
    fn tile_dest(&self, col: u32, row: u32, tile: &TileImage) -> (i64, i64) {
        let tw = i64::from(self.map.tile_width);
        let th = i64::from(self.map.tile_height);
        let x = i64::from(col) * tw;
        let y = match self.anchor {
            TileAnchor::Bottom => (i64::from(row) + 1) * th - i64::from(tile.height),
            TileAnchor::Top => i64::from(row) * th,
        };
        (x, y)
    }

    /// Mark every canvas grid cell covered by `gid`'s raster at `(col, row)`.
    fn mark_damage(&mut self, col: u32, row: u32, gid: Gid) -> TilecycleResult<()> {
        let (tile_w, tile_h, dest) = match self.atlas.get(gid) {
            Some(tile) => (
                i64::from(tile.width),
                i64::from(tile.height),
                self.tile_dest(col, row, tile),
            ),
            None => {
                if !gid.is_empty() && gid != UNRENDERED {
                    return Err(TilecycleError::validation(format!(
                        "gid {} does not resolve to any tileset",
                        gid.0
                    )));
                }
                // No pixels, but the home cell may need clearing.
                let tw = i64::from(self.map.tile_width);
                let th = i64::from(self.map.tile_height);
                (tw, th, (i64::from(col) * tw, i64::from(row) * th))
            }
        };

        let tw = i64::from(self.map.tile_width);
        let th = i64::from(self.map.tile_height);
        let (x0, y0) = dest;
        let cx0 = (x0.div_euclid(tw)).max(0);
        let cy0 = (y0.div_euclid(th)).max(0);
        let cx1 = ((x0 + tile_w - 1).div_euclid(tw)).min(i64::from(self.map.width) - 1);
        let cy1 = ((y0 + tile_h - 1).div_euclid(th)).min(i64::from(self.map.height) - 1);
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                self.damage[(cy * i64::from(self.map.width) + cx) as usize] = true;
            }
        }
        Ok(())
    }

    fn repaint_damaged_cells(&mut self) -> TilecycleResult<()> {
        let map = self.map;
        let atlas = self.atlas;
        let tw = map.tile_width;
        let th = map.tile_height;

        // How many extra layer rows/cols away a tile raster can originate
        // and still reach into a given cell.
        let reach_rows = atlas.max_tile_height().div_ceil(th).max(1) - 1;
        let reach_cols = atlas.max_tile_width().div_ceil(tw).max(1) - 1;

        for cy in 0..map.height {
            for cx in 0..map.width {
                if !self.damage[(cy * map.width + cx) as usize] {
                    continue;
                }
                let clip = PixelRect {
                    x0: i64::from(cx) * i64::from(tw),
                    y0: i64::from(cy) * i64::from(th),
                    x1: (i64::from(cx) + 1) * i64::from(tw),
                    y1: (i64::from(cy) + 1) * i64::from(th),
                };
                clear_rect(&mut self.canvas, clip);

                for (li, layer) in map.layers.iter().enumerate() {
                    let (row_lo, row_hi) = match self.anchor {
                        // Bottom-anchored art reaches upward: cells below
                        // this one may paint into it.
                        TileAnchor::Bottom => (cy, cy.saturating_add(reach_rows)),
                        TileAnchor::Top => (cy.saturating_sub(reach_rows), cy),
                    };
                    let col_lo = cx.saturating_sub(reach_cols);

                    for row in row_lo..=row_hi.min(layer.height.saturating_sub(1)) {
                        for col in col_lo..=cx.min(layer.width.saturating_sub(1)) {
                            let idx = (row * layer.width + col) as usize;
                            let gid = self.cell_gids[li][idx];
                            let Some(tile) = atlas.get(gid) else {
                                continue;
                            };
                            let (dx, dy) = self.tile_dest(col, row, tile);
                            paste_clipped(&mut self.canvas, tile, dx, dy, clip);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct PixelRect {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

fn clear_rect(canvas: &mut FrameRgba, rect: PixelRect) {
    let x0 = rect.x0.clamp(0, i64::from(canvas.width)) as usize;
    let x1 = rect.x1.clamp(0, i64::from(canvas.width)) as usize;
    let y0 = rect.y0.clamp(0, i64::from(canvas.height)) as usize;
    let y1 = rect.y1.clamp(0, i64::from(canvas.height)) as usize;
    if x0 >= x1 {
        return;
    }
    for y in y0..y1 {
        let row = (y * canvas.width as usize + x0) * 4;
        canvas.data[row..row + (x1 - x0) * 4].fill(0);
    }
}

/// Composite `tile` onto `canvas` at `(dest_x, dest_y)`, restricted to the
/// intersection of the tile, the clip rect, and the canvas.
fn paste_clipped(canvas: &mut FrameRgba, tile: &TileImage, dest_x: i64, dest_y: i64, clip: PixelRect) {
    let x0 = dest_x.max(clip.x0).max(0);
    let y0 = dest_y.max(clip.y0).max(0);
    let x1 = (dest_x + i64::from(tile.width))
        .min(clip.x1)
        .min(i64::from(canvas.width));
    let y1 = (dest_y + i64::from(tile.height))
        .min(clip.y1)
        .min(i64::from(canvas.height));
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0..y1 {
        let ty = (y - dest_y) as usize;
        let canvas_row = (y as usize * canvas.width as usize + x0 as usize) * 4;
        let tile_row = (ty * tile.width as usize + (x0 - dest_x) as usize) * 4;
        let width = (x1 - x0) as usize;
        let dst = &mut canvas.data[canvas_row..canvas_row + width * 4];
        let src = &tile.data[tile_row..tile_row + width * 4];
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        }
    }
}
