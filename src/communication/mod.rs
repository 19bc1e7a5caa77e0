//! Transport to the sidecar.

pub mod http;

pub use self::http::{SidecarRequest, SidecarResponse, SidecarTransport};
