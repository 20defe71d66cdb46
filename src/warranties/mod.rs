//! Tracked products: the pure lifecycle core plus its HTTP surface.

pub mod attachments;
pub mod dto;
pub mod filter;
pub mod handlers;
pub mod lifecycle;
pub mod model;
pub mod portfolio;
pub mod repo;

use crate::state::AppState;
use axum::Router;
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::record_routes())
        .merge(handlers::file_routes(max_upload_bytes))
}
