use std::sync::Arc;

use shared::config::server::Config;

use crate::domain::{ChatRoom, Clock, IdleSweeper};

/// Shared application state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub room: Arc<ChatRoom>,
    pub clock: Arc<dyn Clock>,
    pub sweeper: Arc<IdleSweeper>,
    pub config: Arc<Config>,
}
