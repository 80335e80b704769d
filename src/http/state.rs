use std::sync::Arc;
use std::time::Duration;

use crate::broker::Broker;

/// Shared axum state: a handle to the one `Broker` coordinator plus the
/// façade-local defaults the core doesn't need to know about.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub poll_deadline: Duration,
}

impl AppState {
    pub fn new(broker: Arc<Broker>) -> Self {
        let poll_deadline = broker.config().poll_deadline;
        Self {
            broker,
            poll_deadline,
        }
    }
}
