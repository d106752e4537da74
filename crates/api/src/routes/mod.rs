//! HTTP route handlers.

pub mod commands;
pub mod health;
pub mod metrics;
pub mod orders;
