//! HTTP surface.
//!
//! A single route, `GET /?ref=<reference>[&downloadas=<name>]`, answers with
//! the archive for `reference`, streamed while it is being built.

pub mod handlers;

pub use handlers::{AppState, PIPE_CAPACITY, USAGE, ZipQuery, zip_handler};

use axum::Router;
use axum::routing::get;

pub fn create_router(state: AppState) -> Router {
    Router::new().route("/", get(zip_handler)).with_state(state)
}
