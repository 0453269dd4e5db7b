use crate::browser;
use anyhow::{anyhow, Result};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::EventTarget;

/// A DOM listener that stays attached until dropped
pub struct EventListener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl EventListener {
    /// Attach `handler` to `target`, downcasting the event to `E`. Events of
    /// another type are ignored.
    pub fn new<E, F>(target: &EventTarget, event: &'static str, mut handler: F) -> Result<Self>
    where
        E: JsCast + 'static,
        F: FnMut(E) + 'static,
    {
        let callback = browser::closure_wrap(Box::new(move |event: web_sys::Event| {
            if let Ok(event) = event.dyn_into::<E>() {
                handler(event);
            }
        }) as Box<dyn FnMut(web_sys::Event)>);

        target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|err| anyhow!("Cannot listen to '{}' : {:#?}", event, err))?;

        Ok(EventListener {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}
