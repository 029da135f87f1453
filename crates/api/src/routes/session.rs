//! Route definitions for the `/session` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// Routes mounted at `/session`.
///
/// ```text
/// POST   /create       -> create
/// POST   /keepalive    -> keepalive
/// POST   /close        -> close
/// POST   /join         -> join
/// GET    /list         -> list  (?format=text|json)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(session::create))
        .route("/keepalive", post(session::keepalive))
        .route("/close", post(session::close))
        .route("/join", post(session::join))
        .route("/list", get(session::list))
}
