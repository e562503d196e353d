//! API shared state containing actor handles

use crate::actors::{hub::HubHandle, monitor::MonitorHandle};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Hub that websocket observers subscribe to
    pub hub: HubHandle,

    /// Monitor handle for health introspection
    pub monitor: MonitorHandle,
}

impl ApiState {
    pub fn new(hub: HubHandle, monitor: MonitorHandle) -> Self {
        Self { hub, monitor }
    }
}
