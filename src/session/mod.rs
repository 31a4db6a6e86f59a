//! Session orchestration for UI consumers.
//!
//! A [`SessionController`] wraps a [`FuroClient`](crate::FuroClient), runs the
//! mount-time initialization once and publishes a [`SessionState`] that UI
//! code can watch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use furo_auth::{Config, FuroClient, SessionController, SessionOptions};
//!
//! let client = Arc::new(FuroClient::new(Config::from_env()?, local, session, location));
//! let controller = SessionController::new(client, SessionOptions::new());
//!
//! let mut state = controller.subscribe();
//! controller.initialize().await;
//! if state.borrow_and_update().is_authenticated {
//!     let token = controller.get_access_token_silently().await?;
//! }
//! ```

mod controller;
mod options;
mod state;

pub use controller::SessionController;
pub use options::{RedirectCallback, SessionOptions};
pub use state::{SessionAction, SessionState, SessionStatus, reduce};
