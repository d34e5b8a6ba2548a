//! # Courier Config
//!
//! Configuration management for Courier.
//! Supports layered configuration from TOML files, `.env` files and
//! environment variables, with validation and runtime reload.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
