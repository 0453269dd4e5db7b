use crate::engine::{ImageLoader, ImageSource, Layer, Point, Spawner, Stroke, Surface};
use crate::iso;
use crate::session::Session;
use crate::sprite::cache::{self, SharedSpriteCache, SpriteCache};
use crate::sprite::state::{FrameClock, Idle, IsWalking, PlayerContext, PlayerState, Walking};
use crate::sprite::{AnimationMode, SheetMetrics, SpriteKey};
use anyhow::Result;
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;

const MARKER_STROKE: Stroke = Stroke {
    color: "red",
    width: 2.0,
    alpha: 0.5,
};

/// ┌──────────── State Transition Flow ─────────────┐
/// │  From State  →  Event    →  To State           │
/// ├────────────────────────────────────────────────┤
/// │  Idle        →  WalkTo   →  Walking            │
/// │  Walking     →  WalkTo   →  Walking (retarget) │
/// │  Walking     →  Update   →  Idle (arrived)     │
/// └────────────────────────────────────────────────┘
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    WalkTo(Point),
    /// elapsed ms since the previous update
    Update(f64),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PlayerStateMachine {
    Idle(PlayerState<Idle>),
    Walking(PlayerState<Walking>),
}

impl From<PlayerState<Idle>> for PlayerStateMachine {
    fn from(state: PlayerState<Idle>) -> Self {
        PlayerStateMachine::Idle(state)
    }
}

impl From<PlayerState<Walking>> for PlayerStateMachine {
    fn from(state: PlayerState<Walking>) -> Self {
        PlayerStateMachine::Walking(state)
    }
}

impl From<IsWalking> for PlayerStateMachine {
    fn from(is_walking: IsWalking) -> Self {
        match is_walking {
            IsWalking::Arrived(idle) => idle.into(),
            IsWalking::InProgress(walking) => walking.into(),
        }
    }
}

impl PlayerStateMachine {
    pub fn new(position: Point, metrics: &SheetMetrics, speed: f64) -> Self {
        let clock = FrameClock::new(metrics.frame_count, metrics.frame_duration_ms);
        PlayerState::new(position, clock, speed).into()
    }

    pub fn transition(self, event: Event) -> Self {
        type Machine = PlayerStateMachine;
        match (self, event) {
            (Machine::Idle(state), Event::WalkTo(destination)) => {
                state.walk_to(destination).into()
            }
            (Machine::Walking(state), Event::WalkTo(destination)) => {
                state.walk_to(destination).into()
            }
            (Machine::Idle(state), Event::Update(dt_ms)) => state.update(dt_ms).into(),
            (Machine::Walking(state), Event::Update(dt_ms)) => state.update(dt_ms).into(),
        }
    }

    pub fn update(self, dt_ms: f64) -> Self {
        self.transition(Event::Update(dt_ms))
    }

    pub fn context(&self) -> &PlayerContext {
        match self {
            PlayerStateMachine::Idle(state) => state.context(),
            PlayerStateMachine::Walking(state) => state.context(),
        }
    }

    pub fn mode(&self) -> AnimationMode {
        match self {
            PlayerStateMachine::Idle(state) => state.mode(),
            PlayerStateMachine::Walking(state) => state.mode(),
        }
    }

    pub fn destination(&self) -> Option<Point> {
        match self {
            PlayerStateMachine::Idle(_) => None,
            PlayerStateMachine::Walking(state) => Some(state.destination()),
        }
    }

    pub fn position(&self) -> Point {
        self.context().position
    }

    pub fn frame(&self) -> u8 {
        self.context().clock.frame()
    }

    pub fn sprite_key(&self) -> SpriteKey {
        SpriteKey {
            mode: self.mode(),
            direction: self.context().direction,
        }
    }
}

/// The walking character: consumes destinations from the session, advances
/// the state machine each frame, and draws the matching strip frame.
///
/// Strips come from `L` and are loaded through `spawner` on first use.
pub struct Player<L: ImageLoader> {
    state: PlayerStateMachine,
    session: Rc<Session>,
    metrics: Rc<SheetMetrics>,
    sprites: SharedSpriteCache<L::Image>,
    loader: Rc<L>,
    spawner: Rc<dyn Spawner>,
}

impl<L> Player<L>
where
    L: ImageLoader + 'static,
    L::Image: ImageSource + 'static,
{
    pub fn new(
        session: Rc<Session>,
        metrics: SheetMetrics,
        position: Point,
        speed: f64,
        loader: L,
        spawner: Rc<dyn Spawner>,
    ) -> Self {
        Player {
            state: PlayerStateMachine::new(position, &metrics, speed),
            session,
            metrics: Rc::new(metrics),
            sprites: Rc::new(RefCell::new(SpriteCache::default())),
            loader: Rc::new(loader),
            spawner,
        }
    }

    pub fn state(&self) -> &PlayerStateMachine {
        &self.state
    }

    pub fn update(&mut self, dt_ms: f64) {
        if let Some(destination) = self.session.take_destination() {
            self.state = self.state.transition(Event::WalkTo(destination));
        }
        self.state = self.state.update(dt_ms);
    }

    fn request_sprite(&self, key: SpriteKey) {
        if !self.sprites.borrow_mut().request(key) {
            return;
        }
        let path = self.metrics.path(key);
        let (sprites, loader) = (self.sprites.clone(), self.loader.clone());
        self.spawner.spawn(
            async move { cache::fill(sprites, loader.as_ref(), key, &path).await }.boxed_local(),
        );
    }

    fn draw_marker(&self, surface: &dyn Surface) {
        let grid = self.session.grid();
        let tile = iso::screen_to_tile(self.state.position(), grid.tile);
        surface.stroke_polygon(&grid.diamond(tile), MARKER_STROKE);
    }
}

impl<L> Layer for Player<L>
where
    L: ImageLoader + 'static,
    L::Image: ImageSource + 'static,
{
    fn draw(&mut self, surface: &dyn Surface, dt: f64) -> Result<()> {
        self.update(dt * 1000.0);

        let key = self.state.sprite_key();
        self.request_sprite(key);

        let viewport = self.session.viewport(surface.size());
        surface.save();
        let drawn = surface.translate(viewport.origin()).and_then(|_| {
            self.draw_marker(surface);
            // nothing loaded yet, skip this frame
            let Some(image) = self.sprites.borrow_mut().select(key) else {
                return Ok(());
            };
            surface.set_image_smoothing(false);
            surface.draw_image(
                &image,
                &self.metrics.frame_rect(self.state.frame()),
                &self.metrics.destination(self.state.position()),
            )
        });
        surface.restore();
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, SpriteConfig};
    use crate::engine::testing::{Call, RecordingSurface};
    use crate::engine::{Size, Task};
    use crate::iso::Tile;
    use crate::sprite::Direction;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use web_sys::HtmlImageElement;

    fn machine() -> PlayerStateMachine {
        PlayerStateMachine::new(
            Point::default(),
            &SheetMetrics::from(&SpriteConfig::default()),
            2.0,
        )
    }

    #[test]
    fn starts_idle_facing_south() {
        let state = machine();
        assert_eq!(state.mode(), AnimationMode::Idle);
        assert_eq!(state.destination(), None);
        assert_eq!(
            state.sprite_key(),
            SpriteKey {
                mode: AnimationMode::Idle,
                direction: Direction::S
            }
        );
    }

    #[test]
    fn walk_then_arrive() {
        let state = machine().transition(Event::WalkTo(Point::new(-3.0, 0.0)));
        assert_eq!(state.mode(), AnimationMode::Walk);
        assert_eq!(state.destination(), Some(Point::new(-3.0, 0.0)));

        let state = state.update(16.0);
        assert_eq!(state.mode(), AnimationMode::Walk);
        assert_eq!(state.context().direction, Direction::W);
        assert_eq!(state.position(), Point::new(-2.0, 0.0));

        let state = state.update(16.0);
        assert_eq!(state.mode(), AnimationMode::Idle);
        assert_eq!(state.destination(), None);
        assert_eq!(state.position(), Point::new(-3.0, 0.0));
        assert_eq!(state.sprite_key().direction, Direction::W);
    }

    #[test]
    fn idle_stays_put() {
        let mut state = machine();
        for _ in 0..20 {
            state = state.update(25.0);
        }
        assert_eq!(state.position(), Point::default());
        assert_eq!(state.frame(), 5);
    }

    #[test]
    fn frame_index_stays_in_range() {
        let mut state = machine().transition(Event::WalkTo(Point::new(1000.0, 0.0)));
        for _ in 0..500 {
            state = state.update(37.0);
            assert!(state.frame() < 12);
        }
    }

    /// Decoded strip that only knows where it came from
    #[derive(Debug, Clone, PartialEq)]
    struct Strip(String);

    impl ImageSource for Strip {
        fn element(&self) -> Option<&HtmlImageElement> {
            None
        }
    }

    struct Instant;

    #[async_trait(?Send)]
    impl ImageLoader for Instant {
        type Image = Strip;

        async fn load(&self, path: &str) -> Result<Strip> {
            Ok(Strip(path.to_string()))
        }
    }

    /// Holds spawned loads until the test runs them
    #[derive(Default)]
    struct Queue {
        tasks: RefCell<Vec<Task>>,
    }

    impl Queue {
        fn len(&self) -> usize {
            self.tasks.borrow().len()
        }

        fn run_all(&self) {
            let tasks: Vec<Task> = self.tasks.borrow_mut().drain(..).collect();
            for task in tasks {
                block_on(task).unwrap();
            }
        }
    }

    impl Spawner for Queue {
        fn spawn(&self, task: Task) {
            self.tasks.borrow_mut().push(task);
        }
    }

    const SURFACE: Size = Size {
        width: 800.0,
        height: 450.0,
    };

    fn surface() -> RecordingSurface {
        RecordingSurface::new(SURFACE.width, SURFACE.height)
    }

    fn player(queue: &Rc<Queue>) -> (Rc<Session>, Player<Instant>) {
        let session = Rc::new(Session::new(&GameConfig::default()));
        let start = session.grid().screen_of(Tile::new(0, 0));
        let player = Player::new(
            session.clone(),
            SheetMetrics::from(&SpriteConfig::default()),
            start,
            2.0,
            Instant,
            queue.clone(),
        );
        (session, player)
    }

    fn position_of(calls: &[Call], wanted: impl Fn(&Call) -> bool) -> Option<usize> {
        calls.iter().position(wanted)
    }

    #[test]
    fn nothing_is_drawn_before_the_first_strip_loads() {
        let queue = Rc::new(Queue::default());
        let (_, mut player) = player(&queue);
        let surface = surface();

        player.draw(&surface, 0.016).unwrap();
        player.draw(&surface, 0.016).unwrap();

        let calls = surface.calls();
        assert!(!calls.iter().any(|call| matches!(call, Call::Image(..))));
        assert!(!calls.contains(&Call::Smoothing(false)));
        // one load per strip, however many frames ask for it
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn marker_outlines_the_tile_under_the_player() {
        let queue = Rc::new(Queue::default());
        let (session, mut player) = player(&queue);
        let surface = surface();

        player.draw(&surface, 0.016).unwrap();

        let grid = session.grid();
        assert_eq!(surface.strokes(), vec![grid.diamond(Tile::new(0, 0)).to_vec()]);
        let origin = session.viewport(SURFACE).origin();
        assert_eq!(
            surface.calls(),
            vec![
                Call::Save,
                Call::Translate(origin),
                Call::Stroke(grid.diamond(Tile::new(0, 0)).to_vec(), "red".to_string()),
                Call::Restore,
            ]
        );
    }

    #[test]
    fn smoothing_is_off_before_the_strip_is_drawn() {
        let queue = Rc::new(Queue::default());
        let (_, mut player) = player(&queue);
        player.draw(&surface(), 0.016).unwrap();
        queue.run_all();

        let surface = surface();
        player.draw(&surface, 0.016).unwrap();

        let calls = surface.calls();
        let smoothing = position_of(&calls, |call| *call == Call::Smoothing(false)).unwrap();
        let image = position_of(&calls, |call| matches!(call, Call::Image(..))).unwrap();
        assert!(smoothing < image);

        let metrics = SheetMetrics::from(&SpriteConfig::default());
        assert_eq!(
            calls[image],
            Call::Image(
                metrics.frame_rect(player.state().frame()),
                metrics.destination(player.state().position()),
            )
        );
        assert_eq!(calls.last(), Some(&Call::Restore));
    }

    #[test]
    fn click_on_the_session_starts_a_walk() {
        let queue = Rc::new(Queue::default());
        let (session, mut player) = player(&queue);
        let start = player.state().position();
        player.draw(&surface(), 0.016).unwrap();
        queue.run_all();

        let tile = Tile::new(3, 2);
        let pointer = session.grid().screen_of(tile) + session.viewport(SURFACE).origin();
        assert_eq!(session.pointer_clicked(pointer, SURFACE), Some(tile));

        let surface = surface();
        player.draw(&surface, 0.016).unwrap();

        assert_eq!(session.take_destination(), None);
        assert_eq!(player.state().mode(), AnimationMode::Walk);
        assert_eq!(player.state().destination(), Some(session.grid().screen_of(tile)));
        assert_relative_eq!((player.state().position() - start).length(), 2.0);
        // walk strip requested, idle strip still shown meanwhile
        assert_eq!(queue.len(), 1);
        assert!(surface
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Image(..))));
    }
}
