use crate::browser;
use crate::config::GameConfig;
use crate::engine::{
    self, HtmlImageLoader, Layers, LocalSpawner, LoopHandle, Point, RenderLoop, Renderer,
    SharedLayer, Size,
};
use crate::grid::{GridLayer, HoverLayer};
use crate::input::EventListener;
use crate::session::Session;
use crate::sprite::player::Player;
use crate::sprite::SheetMetrics;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::rc::Rc;
use web_sys::{HtmlCanvasElement, MouseEvent, WheelEvent};

/// ┌──────────────────────── Frame / Event Flow ─────────────────────────┐
/// │                                                                     │
/// │  mousemove ─┐                                                       │
/// │  click ─────┼─► Session (hovered, destination, zoom)                │
/// │  wheel ─────┘          │                                            │
/// │                        ▼                                            │
/// │  rAF ─► RenderLoop ─► GridLayer ─► Player ─► HoverLayer             │
/// │                                                                     │
/// └─────────────────────────────────────────────────────────────────────┘
pub struct Game {
    session: Rc<Session>,
    layers: Rc<RefCell<Layers>>,
    frames: LoopHandle,
    // detached on drop
    _listeners: Vec<EventListener>,
}

impl Game {
    /// Load config, build layers, hook up input and start drawing
    pub async fn start() -> Result<Self> {
        let config = Self::load_config().await;
        let canvas = browser::canvas()?;
        let renderer = Rc::new(Renderer::new(browser::context()?));
        fit_canvas(&canvas, config.canvas.aspect)?;

        let session = Rc::new(Session::new(&config));
        let start = session.grid().screen_of(config.player.start);
        let player = Player::new(
            session.clone(),
            SheetMetrics::from(&config.sprite),
            start,
            config.player.speed,
            HtmlImageLoader,
            Rc::new(LocalSpawner),
        );

        // draw order : grid -> player -> hover highlight
        let layers = Rc::new(RefCell::new(Layers::default()));
        {
            let mut layers = layers.borrow_mut();
            let grid: SharedLayer = Rc::new(RefCell::new(GridLayer::new(session.clone())));
            let player: SharedLayer = Rc::new(RefCell::new(player));
            let hover: SharedLayer = Rc::new(RefCell::new(HoverLayer::new(session.clone())));
            layers.register(grid);
            layers.register(player);
            layers.register(hover);
        }

        let listeners = Self::listen(&canvas, &session, config.canvas.aspect)?;

        let zoom_session = session.clone();
        let frames = engine::start_loop(RenderLoop::new(layers.clone()), renderer, move || {
            zoom_session.zoom_factor()
        })?;

        log!(
            "Session started : {}x{} grid, {} layers",
            config.grid.width,
            config.grid.length,
            layers.borrow().len()
        );

        Ok(Game {
            session,
            layers,
            frames,
            _listeners: listeners,
        })
    }

    async fn load_config() -> GameConfig {
        let loaded = browser::fetch_json::<GameConfig>(GameConfig::PATH)
            .await
            .with_context(|| format!("Failed to load config from : {}", GameConfig::PATH))
            .and_then(GameConfig::validate);
        match loaded {
            Ok(config) => config,
            Err(err) => {
                warn!("{:#}, using defaults", err);
                GameConfig::default()
            }
        }
    }

    fn listen(
        canvas: &HtmlCanvasElement,
        session: &Rc<Session>,
        aspect: f64,
    ) -> Result<Vec<EventListener>> {
        let mut listeners = Vec::new();

        let (move_session, move_canvas) = (session.clone(), canvas.clone());
        listeners.push(EventListener::new(
            canvas,
            "mousemove",
            move |event: MouseEvent| {
                move_session.pointer_moved(pointer(&event), surface_size(&move_canvas));
            },
        )?);

        let (click_session, click_canvas) = (session.clone(), canvas.clone());
        listeners.push(EventListener::new(
            canvas,
            "click",
            move |event: MouseEvent| {
                click_session.pointer_clicked(pointer(&event), surface_size(&click_canvas));
            },
        )?);

        let leave_session = session.clone();
        listeners.push(EventListener::new(
            canvas,
            "mouseleave",
            move |_: MouseEvent| leave_session.pointer_left(),
        )?);

        let wheel_session = session.clone();
        listeners.push(EventListener::new(
            canvas,
            "wheel",
            move |event: WheelEvent| {
                event.prevent_default();
                wheel_session.wheel(event.delta_y());
            },
        )?);

        let window = browser::window()?;
        let resize_canvas = canvas.clone();
        listeners.push(EventListener::new(
            &window,
            "resize",
            move |_: web_sys::Event| {
                if let Err(err) = fit_canvas(&resize_canvas, aspect) {
                    error!("{:#}", err);
                }
            },
        )?);

        Ok(listeners)
    }

    /// Cancel the pending frame, detach input and drop transient state
    pub fn stop(self) {
        self.frames.stop();
        self.session.reset();
        log!(
            "Session stopped ({:?}), released {} layers",
            self.frames.state(),
            self.layers.borrow().len()
        );
    }
}

fn pointer(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.offset_x()), f64::from(event.offset_y()))
}

fn surface_size(canvas: &HtmlCanvasElement) -> Size {
    Size {
        width: canvas.width().into(),
        height: canvas.height().into(),
    }
}

/// Full window width, height from the aspect ratio
fn fit_canvas(canvas: &HtmlCanvasElement, aspect: f64) -> Result<()> {
    let (width, _) = browser::window_size()?;
    canvas.set_width(width as u32);
    canvas.set_height((width / aspect) as u32);
    Ok(())
}
