//! Server state: identity plus the registered resource families.

use crate::protocol::ServerInfo;
use crate::registry::Registry;
use std::sync::Arc;

/// Immutable server-side state shared by every transport.
pub struct ServerState {
    pub info: ServerInfo,
    pub registry: Arc<Registry>,
}

impl ServerState {
    pub fn new(info: ServerInfo, registry: Arc<Registry>) -> Self {
        Self { info, registry }
    }
}
