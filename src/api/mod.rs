//! API Module
//!
//! HTTP handlers and routing exposing the cache engine.
//!
//! # Endpoints
//! - `PUT /set` - Cache a payload for an endpoint
//! - `GET /get?endpoint=..&checksum=..` - Look an endpoint up
//! - `POST /sweep` - Run a sweep now
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
