use std::sync::Arc;

use peercode_core::registry::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything sits behind `Arc`. The registry carries no
/// session state, only the store handle and lifecycle settings.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}
