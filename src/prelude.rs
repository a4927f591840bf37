//! Convenience re-exports for easy importing
//!
//! Import everything you need with:
//! ```rust
//! use raven_actix::prelude::*;
//! ```

pub use crate::client::RavenClient;
pub use crate::config::Config;
pub use crate::error::RavenError;
pub use crate::middleware::RavenMiddleware;
pub use crate::packet::{JsonPacket, Level};
