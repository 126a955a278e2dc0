//! HTTP server for the hospital assistant.
//!
//! # Endpoints
//!
//! - `GET  /health`  - liveness check
//! - `POST /chat`    - run one chat turn
//!
//! See [`routes`] for the full list.

pub mod routes;

pub use routes::{app_router, AppState};
