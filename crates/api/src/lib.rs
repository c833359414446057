//! HTTP boundary: seeds caller identity from headers and gates internal routes.

pub mod app;
pub mod context;
pub mod middleware;
pub mod rotation;
