use crate::engine::{Fill, Layer, Point, Size, Stroke, Surface};
use crate::iso::{self, GridBounds, Tile, TileSize};
use crate::session::Session;
use anyhow::Result;
use std::rc::Rc;

const GRID_STROKE: Stroke = Stroke {
    color: "#555",
    width: 1.0,
    alpha: 0.2,
};

const HOVER_FILL: Fill = Fill {
    color: "#fff",
    alpha: 0.25,
};

/// Grid extent plus the tile footprint it is drawn with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub bounds: GridBounds,
    pub tile: TileSize,
}

impl Grid {
    pub fn new(bounds: GridBounds, tile: TileSize) -> Self {
        Grid { bounds, tile }
    }

    /// Tile under a screen position, `None` off the grid
    pub fn tile_at(&self, position: Point) -> Option<Tile> {
        self.bounds.checked(iso::screen_to_tile(position, self.tile))
    }

    pub fn screen_of(&self, tile: Tile) -> Point {
        iso::tile_to_screen(tile, self.tile)
    }

    pub fn diamond(&self, tile: Tile) -> [Point; 4] {
        iso::diamond(self.screen_of(tile), self.tile)
    }
}

/// Maps between surface pixels and screen positions for one frame or event.
///
/// Layers draw after the render loop's zoom transform, so they only need
/// [`Viewport::origin`]. Pointer events arrive in raw surface pixels and are
/// un-zoomed about the surface center first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub surface: Size,
    pub zoom: f64,
    pub grid_center: Point,
}

impl Viewport {
    /// Surface pixel where screen position (0, 0) is drawn, keeping the grid
    /// centered
    pub fn origin(&self) -> Point {
        self.surface.center() - self.grid_center
    }

    pub fn pointer_to_screen(&self, pointer: Point) -> Point {
        let center = self.surface.center();
        let unzoomed = center + (pointer - center) * (1.0 / self.zoom);
        unzoomed - self.origin()
    }
}

pub struct GridLayer {
    session: Rc<Session>,
}

impl GridLayer {
    pub fn new(session: Rc<Session>) -> Self {
        GridLayer { session }
    }
}

impl Layer for GridLayer {
    fn draw(&mut self, surface: &dyn Surface, _dt: f64) -> Result<()> {
        let grid = self.session.grid();
        let viewport = self.session.viewport(surface.size());
        surface.save();
        let drawn = surface.translate(viewport.origin()).map(|_| {
            for tile in grid.bounds.tiles() {
                surface.stroke_polygon(&grid.diamond(tile), GRID_STROKE);
            }
        });
        surface.restore();
        drawn
    }
}

/// Translucent fill over the hovered tile, drawn above the player
pub struct HoverLayer {
    session: Rc<Session>,
}

impl HoverLayer {
    pub fn new(session: Rc<Session>) -> Self {
        HoverLayer { session }
    }
}

impl Layer for HoverLayer {
    fn draw(&mut self, surface: &dyn Surface, _dt: f64) -> Result<()> {
        let Some(tile) = self.session.hovered() else {
            return Ok(());
        };
        let grid = self.session.grid();
        let viewport = self.session.viewport(surface.size());
        surface.save();
        let drawn = surface
            .translate(viewport.origin())
            .map(|_| surface.fill_polygon(&grid.diamond(tile), HOVER_FILL));
        surface.restore();
        drawn
    }
}
