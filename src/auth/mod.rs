use crate::state::AppState;
use axum::Router;

pub mod cookies;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod sweeper;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
