//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the engine.

mod context;
mod handlers;
mod server;

pub use server::HttpServer;
