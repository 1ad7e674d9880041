//! Authenticated session lifecycle
//!
//! One artifact (cookie set + timestamps) per tracker, persisted by the
//! store, renewed by the authenticator, and handed out by the manager under
//! a per-site lock so two queries never race through a login.

pub mod auth;
pub mod manager;
pub mod store;

pub use auth::{Authenticate, BrowserAuthenticator};
pub use manager::{SessionManager, SessionStatus};
pub use store::{SessionArtifact, SessionStore, StoredCookie};
