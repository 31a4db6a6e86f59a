#![doc = include_str!("../README.md")]

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use callback::{RedirectParams, has_auth_params};
pub use client::FuroClient;
pub use config::{CacheLocation, ClientOptions, CodeExchange, Config};
pub use error::Error;
pub use location::{Location, MemoryLocation};
pub use session::{SessionController, SessionOptions, SessionState, SessionStatus};
pub use storage::{KeyValueStore, MemoryStore, StorageKeys, StoreError};
pub use types::{
    AppState, AuthorizeOptions, LogoutOptions, RedirectResult, TokenResponse, User,
};
