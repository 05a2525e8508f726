//! A registry of [`CancelToken`]s keyed by turn id.
//!
//! No group-cascade support (`add_to_group`/`remove_from_group`) here:
//! there's no child-turn concept, only one active turn per session plus a
//! queue of pending ones.

use std::collections::HashMap;

use parking_lot::Mutex;
use rp_domain::CancelToken;
use uuid::Uuid;

#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<Uuid, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, turn_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(turn_id, token.clone());
        token
    }

    pub fn cancel(&self, turn_id: Uuid) {
        if let Some(token) = self.tokens.lock().get(&turn_id) {
            token.cancel();
        }
    }

    pub fn remove(&self, turn_id: Uuid) {
        self.tokens.lock().remove(&turn_id);
    }

    pub fn is_running(&self, turn_id: Uuid) -> bool {
        self.tokens.lock().contains_key(&turn_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_trips_the_registered_token() {
        let map = CancelMap::new();
        let turn_id = Uuid::new_v4();
        let token = map.register(turn_id);
        assert!(!token.is_cancelled());
        map.cancel(turn_id);
        assert!(token.is_cancelled());
    }

    #[test]
    fn remove_forgets_the_turn() {
        let map = CancelMap::new();
        let turn_id = Uuid::new_v4();
        map.register(turn_id);
        assert!(map.is_running(turn_id));
        map.remove(turn_id);
        assert!(!map.is_running(turn_id));
    }
}
