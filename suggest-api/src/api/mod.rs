//! HTTP API handlers for suggest-api

pub mod denylist;
pub mod health;
pub mod suggest;

pub use denylist::denylist_routes;
pub use health::health_routes;
pub use suggest::suggest_routes;
