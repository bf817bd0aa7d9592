use std::sync::Arc;

use application::RealtimeService;

#[derive(Clone)]
pub struct AppState {
    pub realtime: Arc<RealtimeService>,
}

impl AppState {
    pub fn new(realtime: Arc<RealtimeService>) -> Self {
        Self { realtime }
    }
}
