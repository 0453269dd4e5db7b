//! Player states live behind typestates so a walk can only end through
//! `update` and only `Walking` carries a destination:
//! - PUBLIC  : PlayerState<S>, PlayerContext, FrameClock
//! - PRIVATE : context mutators
use crate::engine::Point;
use crate::sprite::{AnimationMode, Direction};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Idle;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Walking {
    destination: Point,
}

pub enum IsWalking {
    Arrived(PlayerState<Idle>),
    InProgress(PlayerState<Walking>),
}

/// Walk-cycle clock. The frame index moves by exactly one, modulo
/// `frame_count`, once `frame_duration_ms` has elapsed since the last advance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameClock {
    frame: u8,
    frame_count: u8,
    frame_duration_ms: f64,
    elapsed_ms: f64,
}

impl FrameClock {
    /// `frame_count` must be at least 1
    pub fn new(frame_count: u8, frame_duration_ms: f64) -> Self {
        FrameClock {
            frame: 0,
            frame_count: frame_count.max(1),
            frame_duration_ms,
            elapsed_ms: 0.0,
        }
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn tick(mut self, dt_ms: f64) -> Self {
        self.elapsed_ms += dt_ms.max(0.0);
        if self.elapsed_ms >= self.frame_duration_ms {
            self.frame = (self.frame + 1) % self.frame_count;
            self.elapsed_ms = 0.0;
        }
        self
    }
}

/// Shared data for :
/// - movement : position + speed
/// - display  : facing + frame clock
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlayerContext {
    pub position: Point,
    pub direction: Direction,
    pub clock: FrameClock,
    /// px per update
    pub speed: f64,
}

impl PlayerContext {
    fn tick(mut self, dt_ms: f64) -> Self {
        self.clock = self.clock.tick(dt_ms);
        self
    }

    fn face(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn move_to(mut self, position: Point) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlayerState<S> {
    context: PlayerContext,
    _state: S,
}

impl<S> PlayerState<S> {
    pub fn context(&self) -> &PlayerContext {
        &self.context
    }
}

impl PlayerState<Idle> {
    pub fn new(position: Point, clock: FrameClock, speed: f64) -> Self {
        PlayerState {
            context: PlayerContext {
                position,
                direction: Direction::default(),
                clock,
                speed,
            },
            _state: Idle,
        }
    }

    pub fn mode(&self) -> AnimationMode {
        AnimationMode::Idle
    }

    pub fn update(mut self, dt_ms: f64) -> Self {
        self.context = self.context.tick(dt_ms);
        self
    }

    pub fn walk_to(self, destination: Point) -> PlayerState<Walking> {
        PlayerState {
            context: self.context,
            _state: Walking { destination },
        }
    }
}

impl PlayerState<Walking> {
    pub fn mode(&self) -> AnimationMode {
        AnimationMode::Walk
    }

    pub fn destination(&self) -> Point {
        self._state.destination
    }

    /// Retarget mid-walk; the next update heads from the current position
    pub fn walk_to(mut self, destination: Point) -> Self {
        self._state.destination = destination;
        self
    }

    /// Advance the clock, then step `speed` px towards the destination or
    /// snap onto it when closer than one step
    pub fn update(mut self, dt_ms: f64) -> IsWalking {
        self.context = self.context.tick(dt_ms);
        let destination = self._state.destination;
        let delta = destination - self.context.position;
        let distance = delta.length();

        if distance < self.context.speed {
            IsWalking::Arrived(self.arrive(destination))
        } else {
            let step = delta * (self.context.speed / distance);
            self.context = self
                .context
                .face(Direction::from_vector(delta))
                .move_to(self.context.position + step);
            IsWalking::InProgress(self)
        }
    }

    fn arrive(self, destination: Point) -> PlayerState<Idle> {
        PlayerState {
            context: self.context.move_to(destination),
            _state: Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn idle_at(x: f64, y: f64) -> PlayerState<Idle> {
        PlayerState::new(Point::new(x, y), FrameClock::new(12, 100.0), 2.0)
    }

    fn walking(state: IsWalking) -> PlayerState<Walking> {
        match state {
            IsWalking::InProgress(walking) => walking,
            IsWalking::Arrived(_) => panic!("arrived too early"),
        }
    }

    fn arrived(state: IsWalking) -> PlayerState<Idle> {
        match state {
            IsWalking::Arrived(idle) => idle,
            IsWalking::InProgress(walking) => {
                panic!("still walking at {:?}", walking.context().position)
            }
        }
    }

    #[test]
    fn clock_advances_once_per_duration() {
        let clock = FrameClock::new(12, 100.0);
        let clock = clock.tick(60.0);
        assert_eq!(clock.frame(), 0);
        let clock = clock.tick(40.0);
        assert_eq!(clock.frame(), 1);
        let clock = clock.tick(99.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn clock_never_skips_frames_on_long_ticks() {
        let clock = FrameClock::new(12, 100.0).tick(1000.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn clock_wraps_after_last_frame() {
        let mut clock = FrameClock::new(12, 100.0);
        let mut seen = Vec::new();
        for _ in 0..13 {
            clock = clock.tick(100.0);
            seen.push(clock.frame());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0, 1]);
    }

    #[test]
    fn clock_ignores_negative_time() {
        let clock = FrameClock::new(12, 100.0).tick(-500.0).tick(99.0);
        assert_eq!(clock.frame(), 0);
    }

    #[test]
    fn walking_moves_speed_pixels_towards_destination() {
        let state = idle_at(0.0, 0.0).walk_to(Point::new(30.0, 40.0));
        let state = walking(state.update(16.0));
        let position = state.context().position;
        assert_relative_eq!(position.x, 1.2);
        assert_relative_eq!(position.y, 1.6);
        assert_eq!(state.context().direction, Direction::SE);
        assert_eq!(state.mode(), AnimationMode::Walk);
    }

    #[test]
    fn close_destination_snaps_and_goes_idle() {
        let destination = Point::new(1.5, 0.0);
        let state = arrived(idle_at(0.0, 0.0).walk_to(destination).update(16.0));
        assert_eq!(state.context().position, destination);
        assert_eq!(state.mode(), AnimationMode::Idle);

        let state = state.update(16.0).update(16.0);
        assert_eq!(state.context().position, destination);
    }

    #[test]
    fn walk_reaches_destination_exactly() {
        let destination = Point::new(-32.0, 16.0);
        let mut state = idle_at(0.0, 0.0).walk_to(destination);
        let mut steps = 0;
        let idle = loop {
            steps += 1;
            match state.update(16.0) {
                IsWalking::InProgress(next) => state = next,
                IsWalking::Arrived(idle) => break idle,
            }
            assert!(steps < 100);
        };
        assert_eq!(idle.context().position, destination);
        assert_eq!(idle.context().direction, Direction::SW);
        // 35.78 px at 2 px per step
        assert_eq!(steps, 18);
    }

    #[test]
    fn retarget_restarts_from_the_current_position() {
        let state = idle_at(0.0, 0.0).walk_to(Point::new(100.0, 0.0));
        let state = walking(state.update(16.0));
        assert_eq!(state.context().direction, Direction::E);

        let state = walking(state.walk_to(Point::new(2.0, -100.0)).update(16.0));
        assert_eq!(state.context().direction, Direction::N);
        assert_relative_eq!(state.context().position.x, 2.0);
        assert_relative_eq!(state.context().position.y, -2.0);
    }

    #[test]
    fn walking_does_not_change_the_clock_cadence() {
        let state = idle_at(0.0, 0.0).walk_to(Point::new(500.0, 0.0));
        let state = walking(state.update(100.0));
        let state = walking(state.update(50.0));
        assert_eq!(state.context().clock.frame(), 1);
    }
}
