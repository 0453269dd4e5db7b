//! Per-session shared state.
//!
//! One writer per field: pointer handlers write `hovered` and `destination`,
//! the player layer takes `destination`, the wheel handler writes `zoom`.
//! Everything runs on the single wasm thread, so `Cell` is enough.
use crate::config::{GameConfig, ZoomConfig};
use crate::engine::{Point, Size};
use crate::grid::{Grid, Viewport};
use crate::iso::Tile;
use std::cell::Cell;

/// Zoom percentage clamped to a configured range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    value: f64,
    min: f64,
    max: f64,
    step: f64,
}

impl Zoom {
    pub fn new(config: &ZoomConfig) -> Self {
        Zoom {
            value: config.default.clamp(config.min, config.max),
            min: config.min,
            max: config.max,
            step: config.step,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set(mut self, value: f64) -> Self {
        self.value = value.clamp(self.min, self.max);
        self
    }

    /// Move by whole steps, positive zooms in
    pub fn nudge(self, steps: f64) -> Self {
        self.set(self.value + steps * self.step)
    }

    /// Scale factor for the surface transform
    pub fn factor(&self) -> f64 {
        self.value() / 100.0
    }
}

pub struct Session {
    grid: Grid,
    zoom_enabled: bool,
    zoom: Cell<Zoom>,
    hovered: Cell<Option<Tile>>,
    destination: Cell<Option<Point>>,
}

impl Session {
    pub fn new(config: &GameConfig) -> Self {
        Session {
            grid: Grid::new(config.grid.bounds(), config.grid.tile),
            zoom_enabled: config.zoom.enabled,
            zoom: Cell::new(Zoom::new(&config.zoom)),
            hovered: Cell::new(None),
            destination: Cell::new(None),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn hovered(&self) -> Option<Tile> {
        self.hovered.get()
    }

    /// Transform factor for the render loop, `None` when zoom is disabled
    pub fn zoom_factor(&self) -> Option<f64> {
        self.zoom_enabled.then(|| self.zoom.get().factor())
    }

    pub fn viewport(&self, surface: Size) -> Viewport {
        Viewport {
            surface,
            zoom: self.zoom_factor().unwrap_or(1.0),
            grid_center: self.grid.bounds.center(self.grid.tile),
        }
    }

    fn tile_under(&self, pointer: Point, surface: Size) -> Option<Tile> {
        let screen = self.viewport(surface).pointer_to_screen(pointer);
        self.grid.tile_at(screen)
    }

    /// Recompute the hovered tile; off-grid clears it
    pub fn pointer_moved(&self, pointer: Point, surface: Size) -> Option<Tile> {
        let tile = self.tile_under(pointer, surface);
        self.hovered.set(tile);
        tile
    }

    pub fn pointer_left(&self) {
        self.hovered.set(None);
    }

    /// Clicking a grid tile makes its center the new destination; clicks off
    /// the grid are ignored
    pub fn pointer_clicked(&self, pointer: Point, surface: Size) -> Option<Tile> {
        let tile = self.tile_under(pointer, surface)?;
        self.destination.set(Some(self.grid.screen_of(tile)));
        Some(tile)
    }

    /// Hand the pending destination to the walker
    pub fn take_destination(&self) -> Option<Point> {
        self.destination.take()
    }

    /// Wheel up (negative delta) zooms in by one step
    pub fn wheel(&self, delta_y: f64) {
        if !self.zoom_enabled || delta_y == 0.0 {
            return;
        }
        self.zoom.set(self.zoom.get().nudge(-delta_y.signum()));
    }

    /// Forget transient pointer state
    pub fn reset(&self) {
        self.hovered.set(None);
        self.destination.set(None);
    }
}
