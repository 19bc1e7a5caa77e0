//! Dapr sidecar client library root.
//!
//! The crate talks to a Dapr sidecar over its HTTP API. It covers state
//! store access, pub/sub publishing, service invocation, output bindings and
//! secret reads, and ships the JSON logger bootstrap used by the demos.

pub mod client;
pub mod communication;
pub mod core;

pub mod build;

pub use crate::client::DaprClient;
pub use crate::core::config::ClientConfig;
pub use crate::core::error::{Error, Result};
pub use crate::core::logging::{setup_logger, LOGGER_NAME};

// Core modules
pub use crate::core::config;
pub use crate::core::error;
pub use crate::core::logging;

/// Prelude module that re-exports the most commonly used types and functions.
///
/// `use dapr_sdk::prelude::*;` is enough for the demos.
pub mod prelude {
    pub use crate::core::config::ClientConfig;
    pub use crate::core::error::{Error, Result};
    pub use crate::core::logging::{
        build_subscriber, duration, init_logger, setup_logger, EncoderConfig, LoggerOptions,
        LOGGER_NAME,
    };

    pub use crate::build::{get_build_info, BuildInfo};

    pub use crate::client::binding::{BindingEvent, InvokeBindingRequest};
    pub use crate::client::invoke::DataContent;
    pub use crate::client::pubsub::PublishOptions;
    pub use crate::client::state::{
        BulkStateItem, DeleteStateItem, ETag, SetStateItem, StateConcurrency, StateConsistency,
        StateItem, StateOperation, StateOptions,
    };
    pub use crate::client::DaprClient;
}
