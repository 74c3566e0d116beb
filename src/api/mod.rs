//! HTTP transport, stored credential, and session state

pub mod client;
pub mod credentials;
pub mod session;

pub use client::{ApiClient, HttpChunks, User};
pub use credentials::CredentialStore;
pub use session::{NationStore, Session, TurnReport};
