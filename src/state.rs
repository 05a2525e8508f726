//! Shared application state handed to every axum handler, grounded on the
//! teacher's `serial_assistant::AppState` — a flat `Clone` struct of `Arc`s
//! passed into `Router::with_state`.

use std::sync::Arc;

use rp_domain::config::Config;
use rp_sessions::SessionController;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionController>,
    pub config: Arc<Config>,
}
