//! # raumchat-observability
//!
//! Structured Logging via tracing-subscriber fuer den Terminal-Client.

pub mod logging;

pub use logging::{
    log_format_gueltig, log_level_gueltig, logging_initialisieren, LogFormat,
};
