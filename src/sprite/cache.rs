use crate::engine::ImageLoader;
use crate::sprite::SpriteKey;
use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
enum Slot<I> {
    Pending,
    Ready(I),
    Failed,
}

/// Sprite strips keyed by (mode, direction), loaded on first use.
///
/// Loads may finish in any order. Until the wanted strip is ready the last
/// strip that was actually shown keeps being returned.
#[derive(Debug)]
pub struct SpriteCache<I> {
    slots: HashMap<SpriteKey, Slot<I>>,
    shown: Option<SpriteKey>,
}

impl<I> Default for SpriteCache<I> {
    fn default() -> Self {
        SpriteCache {
            slots: HashMap::new(),
            shown: None,
        }
    }
}

impl<I: Clone> SpriteCache<I> {
    /// Mark `key` as wanted. True exactly once per key, telling the caller to
    /// start the load.
    pub fn request(&mut self, key: SpriteKey) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, Slot::Pending);
        true
    }

    pub fn loaded(&mut self, key: SpriteKey, image: I) {
        self.slots.insert(key, Slot::Ready(image));
    }

    /// Failed keys are not retried
    pub fn failed(&mut self, key: SpriteKey) {
        self.slots.insert(key, Slot::Failed);
    }

    /// Strip to draw for `key`: its own when ready, otherwise whatever was
    /// shown last, otherwise nothing
    pub fn select(&mut self, key: SpriteKey) -> Option<I> {
        if let Some(Slot::Ready(image)) = self.slots.get(&key) {
            self.shown = Some(key);
            return Some(image.clone());
        }
        match self.shown.and_then(|shown| self.slots.get(&shown)) {
            Some(Slot::Ready(image)) => Some(image.clone()),
            _ => None,
        }
    }
}

pub type SharedSpriteCache<I> = Rc<RefCell<SpriteCache<I>>>;

/// Load one strip into the cache. The borrow is only taken after the load
/// resolves, so frames keep drawing in the meantime.
pub async fn fill<L: ImageLoader>(
    cache: SharedSpriteCache<L::Image>,
    loader: &L,
    key: SpriteKey,
    path: &str,
) -> Result<()> {
    match loader.load(path).await {
        Ok(image) => {
            cache.borrow_mut().loaded(key, image);
            Ok(())
        }
        Err(err) => {
            cache.borrow_mut().failed(key);
            Err(err.context(format!("sprite {} not available", path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{AnimationMode, Direction};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::future::join;

    const IDLE_S: SpriteKey = SpriteKey {
        mode: AnimationMode::Idle,
        direction: Direction::S,
    };
    const WALK_E: SpriteKey = SpriteKey {
        mode: AnimationMode::Walk,
        direction: Direction::E,
    };

    #[test]
    fn request_is_true_once_per_key() {
        let mut cache: SpriteCache<&str> = SpriteCache::default();
        assert!(cache.request(IDLE_S));
        assert!(!cache.request(IDLE_S));
        assert!(cache.request(WALK_E));
    }

    #[test]
    fn nothing_to_draw_before_first_load() {
        let mut cache: SpriteCache<&str> = SpriteCache::default();
        cache.request(IDLE_S);
        assert_eq!(cache.select(IDLE_S), None);
    }

    #[test]
    fn previous_sprite_shows_while_next_loads() {
        let mut cache = SpriteCache::default();
        cache.request(IDLE_S);
        cache.loaded(IDLE_S, "idle_S");
        assert_eq!(cache.select(IDLE_S), Some("idle_S"));

        cache.request(WALK_E);
        assert_eq!(cache.select(WALK_E), Some("idle_S"));

        cache.loaded(WALK_E, "walk_E");
        assert_eq!(cache.select(WALK_E), Some("walk_E"));
    }

    #[test]
    fn failed_load_keeps_previous_sprite_and_is_not_retried() {
        let mut cache = SpriteCache::default();
        cache.request(IDLE_S);
        cache.loaded(IDLE_S, "idle_S");
        cache.select(IDLE_S);
        cache.request(WALK_E);
        cache.failed(WALK_E);
        assert!(!cache.request(WALK_E));
        assert_eq!(cache.select(WALK_E), Some("idle_S"));
    }

    #[test]
    fn ready_but_never_shown_is_not_a_fallback() {
        let mut cache = SpriteCache::default();
        cache.request(IDLE_S);
        cache.request(WALK_E);
        cache.loaded(WALK_E, "walk_E");
        assert_eq!(cache.select(IDLE_S), None);
        assert_eq!(cache.select(WALK_E), Some("walk_E"));
    }

    /// Loader whose loads resolve when the test says so
    struct Gate {
        pending: RefCell<HashMap<String, oneshot::Receiver<Result<&'static str>>>>,
    }

    #[async_trait(?Send)]
    impl ImageLoader for Gate {
        type Image = &'static str;

        async fn load(&self, path: &str) -> Result<&'static str> {
            let rx = self
                .pending
                .borrow_mut()
                .remove(path)
                .ok_or_else(|| anyhow!("unexpected load {}", path))?;
            rx.await?
        }
    }

    #[test]
    fn loads_may_finish_out_of_order() {
        let (idle_tx, idle_rx) = oneshot::channel();
        let (walk_tx, walk_rx) = oneshot::channel();
        let gate = Gate {
            pending: RefCell::new(HashMap::from([
                ("idle".to_string(), idle_rx),
                ("walk".to_string(), walk_rx),
            ])),
        };
        let cache: SharedSpriteCache<&str> = Rc::new(RefCell::new(SpriteCache::default()));
        cache.borrow_mut().request(IDLE_S);
        cache.borrow_mut().request(WALK_E);

        walk_tx.send(Ok("walk_E")).unwrap();
        idle_tx.send(Err(anyhow!("404"))).unwrap();
        let (idle, walk) = block_on(join(
            fill(cache.clone(), &gate, IDLE_S, "idle"),
            fill(cache.clone(), &gate, WALK_E, "walk"),
        ));

        assert!(idle.is_err());
        assert!(walk.is_ok());
        let mut cache = cache.borrow_mut();
        assert_eq!(cache.select(WALK_E), Some("walk_E"));
        assert_eq!(cache.select(IDLE_S), Some("walk_E"));
    }
}
