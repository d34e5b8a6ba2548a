//! # Courier Core
//!
//! Shared error types and the logging bootstrap used by the cache and
//! broker crates.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
pub use telemetry::{init_logging, LogFormat, LoggingConfig};

// Re-export shaku so capability traits can be registered as DI interfaces
pub use shaku::Interface;
