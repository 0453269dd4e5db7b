use crate::iso::{GridBounds, Tile, TileSize};
use anyhow::{bail, Result};
use serde::Deserialize;

/// Tunables for a session. Any field missing from `config.json` keeps its
/// default.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub sprite: SpriteConfig,
    pub player: PlayerConfig,
    pub zoom: ZoomConfig,
    pub canvas: CanvasConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub length: u32,
    pub tile: TileSize,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            width: 10,
            length: 10,
            tile: TileSize::default(),
        }
    }
}

impl GridConfig {
    /// Largest accepted width or length, in tiles
    pub const MAX_EDGE: u32 = 1024;

    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.width, self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// Edge of one square frame in the sheet, px
    pub frame_size: f64,
    pub frame_count: u8,
    pub frame_duration_ms: f64,
    /// On-screen magnification of a frame
    pub scale: f64,
    /// Directory holding `{mode}/{mode}_{DIR}.png` strips
    pub root: String,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        SpriteConfig {
            frame_size: 64.0,
            frame_count: 12,
            frame_duration_ms: 100.0,
            scale: 2.0,
            root: "assets/characters/blank".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// px per frame
    pub speed: f64,
    pub start: Tile,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            speed: 2.0,
            start: Tile::new(0, 0),
        }
    }
}

/// Zoom is a percentage, 100 draws at natural size
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub enabled: bool,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        ZoomConfig {
            enabled: true,
            default: 100.0,
            min: 10.0,
            max: 1000.0,
            step: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// width / height
    pub aspect: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig {
            aspect: 16.0 / 9.0,
        }
    }
}

impl GameConfig {
    pub const PATH: &'static str = "config.json";

    /// Reject values the game cannot run with, clamp the ones it can
    pub fn validate(mut self) -> Result<Self> {
        let (width, length) = (self.grid.width, self.grid.length);
        if width == 0 || length == 0 {
            bail!("grid must have at least one tile, got {}x{}", width, length);
        }
        if width > GridConfig::MAX_EDGE || length > GridConfig::MAX_EDGE {
            bail!(
                "grid {}x{} is larger than {} tiles per edge",
                width,
                length,
                GridConfig::MAX_EDGE
            );
        }
        if !self.grid.bounds().contains(self.player.start) {
            bail!(
                "player.start ({}, {}) is outside the {}x{} grid",
                self.player.start.col,
                self.player.start.row,
                width,
                length
            );
        }
        let tile = self.grid.tile;
        if !(tile.w > 0.0 && tile.h > 0.0) {
            bail!("tile size must be positive, got {}x{}", tile.w, tile.h);
        }
        if self.sprite.frame_count == 0 {
            bail!("sprite.frame_count must be at least 1");
        }
        if !(self.sprite.frame_duration_ms > 0.0) {
            bail!("sprite.frame_duration_ms must be positive");
        }
        if !(self.sprite.frame_size > 0.0 && self.sprite.scale > 0.0) {
            bail!("sprite.frame_size and sprite.scale must be positive");
        }
        if !(self.player.speed > 0.0) {
            bail!("player.speed must be positive, got {}", self.player.speed);
        }
        if !(self.zoom.min > 0.0 && self.zoom.min <= self.zoom.max) {
            bail!(
                "zoom range [{}, {}] is empty or not positive",
                self.zoom.min,
                self.zoom.max
            );
        }
        if !(self.canvas.aspect > 0.0) {
            bail!("canvas.aspect must be positive");
        }
        self.zoom.default = self.zoom.default.clamp(self.zoom.min, self.zoom.max);
        Ok(self)
    }
}
