//! Account lifecycle: registration, login, settings updates, deactivation.

pub mod error;
pub mod service;
pub mod settings;

pub use error::{AccountError, AccountResult};
pub use service::{AccountService, Registration};
