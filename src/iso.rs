//! Isometric coordinate mapping.
//!
//! Tiles are addressed by integer `(col, row)`. Screen positions are pixel
//! offsets of a diamond's *center* relative to the center of tile `(0, 0)`:
//!
//! ```text
//!                 (0,0)
//!               /      \
//!          (0,1)        (1,0)        x = (col - row) * w/2
//!        /      \      /      \      y = (col + row) * h/2
//!   (0,2)        (1,1)        (2,0)
//! ```
use crate::engine::Point;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct Tile {
    pub col: i32,
    pub row: i32,
}

impl Tile {
    pub const fn new(col: i32, row: i32) -> Self {
        Tile { col, row }
    }
}

/// Diamond footprint of one tile in pixels, 2:1 by default
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TileSize {
    pub w: f64,
    pub h: f64,
}

impl Default for TileSize {
    fn default() -> Self {
        TileSize { w: 64.0, h: 32.0 }
    }
}

impl TileSize {
    pub fn half_w(&self) -> f64 {
        self.w / 2.0
    }

    pub fn half_h(&self) -> f64 {
        self.h / 2.0
    }
}

pub fn tile_to_screen(tile: Tile, size: TileSize) -> Point {
    Point {
        x: f64::from(tile.col - tile.row) * size.half_w(),
        y: f64::from(tile.col + tile.row) * size.half_h(),
    }
}

/// Inverse of [`tile_to_screen`]. Any point inside a diamond resolves to that
/// diamond's tile. Halves round up, so shared edges belong to the tile further
/// along each axis.
pub fn screen_to_tile(position: Point, size: TileSize) -> Tile {
    let x = position.x / size.half_w();
    let y = position.y / size.half_h();
    Tile {
        col: round_half_up((x + y) / 2.0),
        row: round_half_up((y - x) / 2.0),
    }
}

fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Top, right, bottom, left vertices of the diamond centered on `center`
pub fn diamond(center: Point, size: TileSize) -> [Point; 4] {
    [
        Point::new(center.x, center.y - size.half_h()),
        Point::new(center.x + size.half_w(), center.y),
        Point::new(center.x, center.y + size.half_h()),
        Point::new(center.x - size.half_w(), center.y),
    ]
}

/// Grid extent in tiles. Valid tiles satisfy `0 <= col < width` and
/// `0 <= row < length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub width: u32,
    pub length: u32,
}

impl GridBounds {
    pub fn new(width: u32, length: u32) -> Self {
        GridBounds { width, length }
    }

    pub fn contains(&self, tile: Tile) -> bool {
        tile.col >= 0
            && tile.row >= 0
            && (tile.col as u32) < self.width
            && (tile.row as u32) < self.length
    }

    /// `Some(tile)` only when the tile lies on the grid
    pub fn checked(&self, tile: Tile) -> Option<Tile> {
        self.contains(tile).then_some(tile)
    }

    /// Row-major walk over every tile on the grid
    pub fn tiles(&self) -> impl Iterator<Item = Tile> {
        let (width, length) = (to_index(self.width), to_index(self.length));
        (0..width).flat_map(move |col| (0..length).map(move |row| Tile::new(col, row)))
    }

    /// Screen position of the grid's visual center, used to keep the grid
    /// centered on the drawing surface
    pub fn center(&self, size: TileSize) -> Point {
        let last_col = f64::from(self.width.saturating_sub(1));
        let last_row = f64::from(self.length.saturating_sub(1));
        Point {
            x: (last_col - last_row) / 2.0 * size.half_w(),
            y: (last_col + last_row) / 2.0 * size.half_h(),
        }
    }
}

// tile indices are i32, anything wider is cut at i32::MAX
fn to_index(edge: u32) -> i32 {
    i32::try_from(edge).unwrap_or(i32::MAX)
}
