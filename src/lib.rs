//! Redis-backed session storage: create, read, invalidate and sweep user sessions.

pub mod client;
pub mod config;
pub mod error;
pub mod store;

pub mod models {
    pub mod session;
}

pub mod repositories {
    pub mod session;
}

pub mod services {
    pub mod session;
}

pub mod validation {
    pub mod session;
}

pub use client::{HealthReport, SessionClient};
pub use config::Config;
pub use error::{Result, SessionError, ValidationError};
pub use models::session::{Metadata, MetadataValue, Session};
pub use services::session::{SessionManager, SessionStats};
