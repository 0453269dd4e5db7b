use crate::browser;
use anyhow::{anyhow, Error, Result};
// wasm is single threaded, so Rc + RefCell/Cell instead of Arc + Mutex
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::ops::{Add, Mul, Sub};
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

// ==================== Geometry ====================
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }
}

// ==================== Drawing surface ====================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke<'a> {
    pub color: &'a str,
    pub width: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill<'a> {
    pub color: &'a str,
    pub alpha: f64,
}

/// Anything a surface can copy pixels from
pub trait ImageSource {
    /// `None` for images that exist without a DOM element
    fn element(&self) -> Option<&HtmlImageElement>;
}

impl ImageSource for HtmlImageElement {
    fn element(&self) -> Option<&HtmlImageElement> {
        Some(self)
    }
}

/// Everything the game needs from a 2d raster target
pub trait Surface {
    fn size(&self) -> Size;
    fn clear(&self, rect: &Rect);
    fn save(&self);
    fn restore(&self);
    fn translate(&self, offset: Point) -> Result<()>;
    fn scale(&self, factor: f64) -> Result<()>;
    fn set_image_smoothing(&self, enabled: bool);
    fn draw_image(&self, image: &dyn ImageSource, frame: &Rect, destination: &Rect)
        -> Result<()>;
    fn stroke_polygon(&self, points: &[Point], stroke: Stroke);
    fn fill_polygon(&self, points: &[Point], fill: Fill);
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn new(context: CanvasRenderingContext2d) -> Self {
        Renderer { context }
    }

    fn trace(&self, points: &[Point]) {
        self.context.begin_path();
        let mut points = points.iter();
        if let Some(first) = points.next() {
            self.context.move_to(first.x, first.y);
        }
        for point in points {
            self.context.line_to(point.x, point.y);
        }
        self.context.close_path();
    }
}

impl Surface for Renderer {
    fn size(&self) -> Size {
        self.context
            .canvas()
            .map(|canvas| Size {
                width: canvas.width().into(),
                height: canvas.height().into(),
            })
            .unwrap_or_default()
    }

    fn clear(&self, rect: &Rect) {
        self.context
            .clear_rect(rect.x(), rect.y(), rect.width(), rect.height());
    }

    fn save(&self) {
        self.context.save();
    }

    fn restore(&self) {
        self.context.restore();
    }

    fn translate(&self, offset: Point) -> Result<()> {
        self.context
            .translate(offset.x, offset.y)
            .map_err(|err| anyhow!("Cannot translate context : {:#?}", err))
    }

    fn scale(&self, factor: f64) -> Result<()> {
        self.context
            .scale(factor, factor)
            .map_err(|err| anyhow!("Cannot scale context : {:#?}", err))
    }

    fn set_image_smoothing(&self, enabled: bool) {
        self.context.set_image_smoothing_enabled(enabled);
    }

    fn draw_image(
        &self,
        image: &dyn ImageSource,
        frame: &Rect,
        destination: &Rect,
    ) -> Result<()> {
        let element = image
            .element()
            .ok_or_else(|| anyhow!("Image has no element to draw"))?;
        self.context
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                element,
                frame.x(),
                frame.y(),
                frame.width(),
                frame.height(),
                destination.x(),
                destination.y(),
                destination.width(),
                destination.height(),
            )
            .map_err(|err| anyhow!("Cannot draw image : {:#?}", err))
    }

    fn stroke_polygon(&self, points: &[Point], stroke: Stroke) {
        self.context.save();
        self.trace(points);
        self.context.set_stroke_style_str(stroke.color);
        self.context.set_line_width(stroke.width);
        self.context.set_global_alpha(stroke.alpha);
        self.context.stroke();
        self.context.restore();
    }

    fn fill_polygon(&self, points: &[Point], fill: Fill) {
        self.context.save();
        self.trace(points);
        self.context.set_fill_style_str(fill.color);
        self.context.set_global_alpha(fill.alpha);
        self.context.fill();
        self.context.restore();
    }
}

// ==================== Layers ====================
/// One draw callback of the render loop, `dt` in seconds
pub trait Layer {
    fn draw(&mut self, surface: &dyn Surface, dt: f64) -> Result<()>;
}

pub type SharedLayer = Rc<RefCell<dyn Layer>>;

/// Draw callbacks in insertion order. Identity is the allocation, so
/// registering the same `Rc` twice keeps a single entry.
#[derive(Default)]
pub struct Layers {
    entries: Vec<SharedLayer>,
}

impl Layers {
    /// Returns false when the layer was already registered
    pub fn register(&mut self, layer: SharedLayer) -> bool {
        if self.contains(&layer) {
            return false;
        }
        self.entries.push(layer);
        true
    }

    /// Returns false when the layer was not registered
    pub fn unregister(&mut self, layer: &SharedLayer) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !same_layer(entry, layer));
        self.entries.len() != before
    }

    pub fn contains(&self, layer: &SharedLayer) -> bool {
        self.entries.iter().any(|entry| same_layer(entry, layer))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // cloned so layers may (un)register while the frame is being drawn
    fn snapshot(&self) -> Vec<SharedLayer> {
        self.entries.clone()
    }
}

fn same_layer(a: &SharedLayer, b: &SharedLayer) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

// ==================== Render loop ====================
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopState {
    /// No surface yet, frames are ignored
    Idle,
    /// Drawing, `last_frame` is the previous frame timestamp in ms
    Running { last_frame: f64 },
}

pub struct RenderLoop {
    state: LoopState,
    layers: Rc<RefCell<Layers>>,
}

impl RenderLoop {
    pub fn new(layers: Rc<RefCell<Layers>>) -> Self {
        RenderLoop {
            state: LoopState::Idle,
            layers,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Idle -> Running once a surface exists
    pub fn start(&mut self, now: f64) {
        if self.state == LoopState::Idle {
            self.state = LoopState::Running { last_frame: now };
        }
    }

    pub fn stop(&mut self) {
        self.state = LoopState::Idle;
    }

    /// Draw one frame at timestamp `now` (ms). `zoom` is a scale factor
    /// applied about the surface center, `None` leaves the transform alone.
    ///
    /// Every layer is drawn even if an earlier one fails; the first failure is
    /// returned.
    pub fn frame(&mut self, surface: &dyn Surface, now: f64, zoom: Option<f64>) -> Result<()> {
        let LoopState::Running { last_frame } = self.state else {
            return Ok(());
        };
        let dt = ((now - last_frame) / 1000.0).max(0.0);
        self.state = LoopState::Running { last_frame: now };

        let size = surface.size();
        surface.save();
        surface.clear(&Rect::new(Point::default(), size));

        let mut result: Result<()> = match zoom {
            Some(factor) => scale_about(surface, size.center(), factor),
            None => Ok(()),
        };

        let layers = self.layers.borrow().snapshot();
        for layer in layers {
            let drawn = layer.borrow_mut().draw(surface, dt);
            if result.is_ok() {
                result = drawn;
            }
        }

        surface.restore();
        result
    }
}

fn scale_about(surface: &dyn Surface, center: Point, factor: f64) -> Result<()> {
    surface.translate(center)?;
    surface.scale(factor)?;
    surface.translate(center * -1.0)
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

/// Keeps the animation frame chain alive. Stopping (or dropping) cancels the
/// pending frame so no layer runs after teardown.
pub struct LoopHandle {
    frame_id: Rc<Cell<Option<i32>>>,
    running: Rc<Cell<bool>>,
    render_loop: Rc<RefCell<RenderLoop>>,
    closure: SharedLoopClosure,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn state(&self) -> LoopState {
        self.render_loop.borrow().state()
    }

    pub fn stop(&self) {
        self.running.set(false);
        if let Some(id) = self.frame_id.take() {
            if let Err(err) = browser::cancel_animation_frame(id) {
                error!("{:#}", err);
            }
        }
        // borrowed only while a frame is being drawn, that frame idles it
        if let Ok(mut render_loop) = self.render_loop.try_borrow_mut() {
            render_loop.stop();
        }
        // breaks the closure -> closure cell cycle
        self.closure.borrow_mut().take();
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.running.get() {
            self.stop();
        }
    }
}

/// Start driving `render_loop` from requestAnimationFrame. `zoom` is read
/// every frame.
pub fn start_loop(
    mut render_loop: RenderLoop,
    surface: Rc<dyn Surface>,
    zoom: impl Fn() -> Option<f64> + 'static,
) -> Result<LoopHandle> {
    render_loop.start(browser::now()?);
    let render_loop = Rc::new(RefCell::new(render_loop));

    let frame_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
    let running = Rc::new(Cell::new(true));
    let f: SharedLoopClosure = Rc::new(RefCell::new(None));
    let g = f.clone();

    let loop_frame_id = frame_id.clone();
    let loop_running = running.clone();
    let loop_render = render_loop.clone();
    *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
        loop_frame_id.set(None);
        if loop_running.get() {
            let drawn = loop_render.borrow_mut().frame(surface.as_ref(), perf, zoom());
            if let Err(err) = drawn {
                error!("Frame failed : {:#}", err);
            }
        }
        if !loop_running.get() {
            loop_render.borrow_mut().stop();
            return;
        }
        if let Some(closure) = f.borrow().as_ref() {
            match browser::request_animation_frame(closure) {
                Ok(id) => loop_frame_id.set(Some(id)),
                Err(err) => error!("{:#}", err),
            }
        }
    }));

    let id = browser::request_animation_frame(
        g.borrow()
            .as_ref()
            .ok_or_else(|| anyhow!("RenderLoop: Loop is None"))?,
    )?;
    frame_id.set(Some(id));

    Ok(LoopHandle {
        frame_id,
        running,
        render_loop,
        closure: g,
    })
}

// ==================== Images ====================
/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let source_name = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!(
                "Error loading image {} : {:#?}",
                source_name,
                err
            )));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callbacks alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    // Result<Result<(), Error>, oneshot::Canceled> : first ? for the channel,
    // second for the load itself
    rx.await??;

    Ok(image)
}

/// Source of decoded images, keyed by path
#[async_trait(?Send)]
pub trait ImageLoader {
    type Image: Clone;

    async fn load(&self, path: &str) -> Result<Self::Image>;
}

pub struct HtmlImageLoader;

#[async_trait(?Send)]
impl ImageLoader for HtmlImageLoader {
    type Image = HtmlImageElement;

    async fn load(&self, path: &str) -> Result<HtmlImageElement> {
        load_image(path).await
    }
}

/// Background work started from a frame, e.g. a sprite load
pub type Task = LocalBoxFuture<'static, Result<()>>;

/// Runs tasks off the frame. Failures are the spawner's to report.
pub trait Spawner {
    fn spawn(&self, task: Task);
}

/// Spawns onto the browser's microtask queue and logs failures
pub struct LocalSpawner;

impl Spawner for LocalSpawner {
    fn spawn(&self, task: Task) {
        browser::spawn_local(async move {
            if let Err(err) = task.await {
                warn!("{:#}", err);
            }
        });
    }
}
