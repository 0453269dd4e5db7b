// ┌──────────────────────────────────────────────────────────────────────────┐
// │                          Directory Structure                             │
// ├───────────────────┬──────────────────────────────────────────────────────┤
// │ src/              │                                                      │
// │ ├── lib.rs        │ wasm entry points                                    │
// │ ├── browser.rs    │ window / canvas / fetch / console glue               │
// │ ├── engine.rs     │ Surface, Renderer, Layers, RenderLoop, images        │
// │ ├── iso.rs        │ tile <-> screen mapping                              │
// │ ├── config.rs     │ GameConfig from config.json                          │
// │ ├── session.rs    │ hover / destination / zoom shared by everything      │
// │ ├── grid.rs       │ grid + hover highlight layers                        │
// │ ├── input.rs      │ DOM listeners removed on drop                        │
// │ ├── game.rs       │ wires it all together                                │
// │ └── sprite/       │ facing, player states, sprite cache, player layer    │
// └───────────────────┴──────────────────────────────────────────────────────┘
use std::cell::RefCell;
use wasm_bindgen::prelude::*;

#[macro_use]
mod browser;
pub mod config;
pub mod engine;
mod game;
pub mod grid;
mod input;
pub mod iso;
pub mod session;
pub mod sprite;

use game::Game;

thread_local! {
    // the running session, if any
    static GAME: RefCell<Option<Game>> = const { RefCell::new(None) };
}

/// Main entry for the WebAssembly module
/// - checks the canvas has a 2d context (fatal otherwise)
/// - starts a session in the background
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();

    browser::context().map_err(|err| JsValue::from_str(&format!("{:#}", err)))?;

    browser::spawn_local(async move {
        match Game::start().await {
            Ok(game) => {
                if let Some(previous) = GAME.with(|slot| slot.borrow_mut().replace(game)) {
                    previous.stop();
                }
            }
            Err(err) => error!("Could not start game : {:#}", err),
        }
    });

    Ok(())
}

/// Tear the running session down: no frame callback fires afterwards
#[wasm_bindgen]
pub fn stop_js() {
    if let Some(game) = GAME.with(|slot| slot.borrow_mut().take()) {
        game.stop();
    }
}
