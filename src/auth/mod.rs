//! User authentication and credential storage.
//!
//! Provides:
//! - SQLite-backed user records with a unique email constraint
//! - Argon2id password hashing (PHC strings, per-hash random salt)
//! - HS256 bearer tokens binding identity + email, secret injected from config
//! - A stateless gate that turns an `Authorization` header into an identity
//!
//! ## Design Decisions
//! - Tokens carry no expiry unless `auth.token_ttl_secs` is configured.
//! - Saves are compare-and-set on a `version` column, so two concurrent
//!   updates to the same user cannot silently overwrite each other.

pub mod gate;
pub mod model;
pub mod password;
pub mod store;
pub mod token;

pub use gate::{AuthContext, AuthRejection, GateDecision};
pub use model::{
    NewUser, NotificationPreferences, NotificationsPatch, ProfilePatch, Theme, User, UserView,
};
pub use password::{HashError, PasswordHasher};
pub use store::{SqliteUserStore, StoreError, UserStore};
pub use token::{Claims, TokenError, TokenIssuer};
