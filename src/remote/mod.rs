//! Remote store boundary for the Passerby Edge Agent.
//!
//! Defines the authenticated-session abstraction the sync orchestrator
//! drives, an in-process implementation for tests and offline runs, and an
//! HTTP-backed implementation behind the `http-store` feature.

pub mod http;
pub mod memory;
pub mod session;

// Re-export commonly used types
pub use http::HttpStoreConfig;
pub use memory::MemorySession;
pub use session::{RemoteError, RemoteSession, SessionEvent, TaskOutcome, UploadTask};

#[cfg(feature = "http-store")]
pub use http::HttpSession;
