//! # Vendor dispatch server
//! This crate hosts the network surfaces of the vendor dispatch core. It is responsible for:
//! * Accepting real-time connections from vendors and customers, and relaying offers, accept/reject decisions and
//!   status updates between them and the [dispatch engine](dispatch_engine).
//! * Exposing an HTTP API for order ingestion, vendor onboarding and the administrative operations (manual dispatch,
//!   forced assignment, status overrides and offer expiry).
//! * Expiring stale offers in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Bearer-token protected routes. See [routes](routes/index.html).
//!
//! The real-time channel listens on its own port. See [realtime](realtime/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod middleware;
pub mod realtime;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
