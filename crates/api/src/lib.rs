//! # Amity API
//!
//! HTTP application layer - routes and server wiring.
//!
//! This crate contains:
//! - axum route handlers (OAuth, webhook, booking, quota, billing, health)
//! - Application context (dependency injection)
//! - The `amityd` server binary

pub mod context;
pub mod error;
pub mod routes;

pub use context::AppContext;
pub use error::ApiError;
pub use routes::router;
