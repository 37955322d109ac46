//! Marketplace access service: role engine gate, agent promotion/demotion and
//! the listing-cache coherency hooks behind one HTTP surface.

pub mod app;
pub mod config;
pub mod gate;
pub mod gate_handlers;
pub mod promotion;
pub mod store;
pub mod tenant_handlers;
pub mod tenants;
pub mod user_handlers;

pub use app::{build_router, AppState};
