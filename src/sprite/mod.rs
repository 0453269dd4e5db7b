// ┌──────────────────────────────────────────────────────────────────────────┐
// │                          sprite/ layout                                  │
// ├────────────────┬─────────────────────────────────────────────────────────┤
// │ mod.rs         │ Direction, AnimationMode, sheet geometry                │
// │ state.rs       │ PlayerState<S> typestates + frame clock                 │
// │ cache.rs       │ lazily loaded strips keyed by (mode, direction)         │
// │ player.rs      │ PlayerStateMachine + the player draw layer              │
// └────────────────┴─────────────────────────────────────────────────────────┘
pub mod cache;
pub mod player;
pub mod state;

use crate::config::SpriteConfig;
use crate::engine::{Point, Rect, Size};
use std::f64::consts::FRAC_PI_4;
use std::fmt;

/// Facing, clockwise from east. Screen y grows downwards so south is +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    E,
    SE,
    #[default]
    S,
    SW,
    W,
    NW,
    N,
    NE,
}

impl Direction {
    const CLOCKWISE: [Direction; 8] = [
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
        Direction::N,
        Direction::NE,
    ];

    /// Bucket a heading into 45° sectors centered on each compass point.
    /// Headings exactly on a sector edge (±22.5°) round away from east.
    pub fn from_vector(delta: Point) -> Self {
        let sector = (delta.y.atan2(delta.x) / FRAC_PI_4).round() as i32;
        Self::CLOCKWISE[sector.rem_euclid(8) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
            Direction::N => "N",
            Direction::NE => "NE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimationMode {
    #[default]
    Idle,
    Walk,
}

impl AnimationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationMode::Idle => "idle",
            AnimationMode::Walk => "walk",
        }
    }
}

/// Which strip to sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteKey {
    pub mode: AnimationMode,
    pub direction: Direction,
}

/// Geometry of a horizontal strip of equal square frames
#[derive(Debug, Clone, PartialEq)]
pub struct SheetMetrics {
    pub frame_size: f64,
    pub frame_count: u8,
    pub frame_duration_ms: f64,
    pub scale: f64,
    pub root: String,
}

impl From<&SpriteConfig> for SheetMetrics {
    fn from(config: &SpriteConfig) -> Self {
        SheetMetrics {
            frame_size: config.frame_size,
            frame_count: config.frame_count,
            frame_duration_ms: config.frame_duration_ms,
            scale: config.scale,
            root: config.root.clone(),
        }
    }
}

impl SheetMetrics {
    /// `{root}/walk/walk_SE.png`
    pub fn path(&self, key: SpriteKey) -> String {
        let mode = key.mode.as_str();
        format!("{}/{}/{}_{}.png", self.root, mode, mode, key.direction)
    }

    /// Source rectangle of `frame` inside the strip
    pub fn frame_rect(&self, frame: u8) -> Rect {
        Rect::new(
            Point::new(f64::from(frame) * self.frame_size, 0.0),
            Size {
                width: self.frame_size,
                height: self.frame_size,
            },
        )
    }

    /// Where the scaled frame lands so the character's feet sit on `feet`.
    /// Feet are drawn a quarter of the frame above its bottom edge.
    pub fn destination(&self, feet: Point) -> Rect {
        let edge = self.frame_size * self.scale;
        Rect::new(
            Point::new(feet.x - edge / 2.0, feet.y - edge * 0.75),
            Size {
                width: edge,
                height: edge,
            },
        )
    }
}
