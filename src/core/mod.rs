//! Fundamental SDK building blocks: config, errors, logging.

pub mod config;
pub mod error;
pub mod logging;
