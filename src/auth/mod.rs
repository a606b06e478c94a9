//! Authentication and session orchestration.
//!
//! Flow overview:
//! - `register` creates an unverified credentials user and mails a confirmation link.
//! - `login` checks the password, re-sends the link for unverified users, and
//!   binds a fresh session otherwise.
//! - `oauth_callback` trades a provider code for a profile, links or creates the
//!   user, and binds a session.
//! - `verify_email` consumes a single-use token; the user logs in afterwards.
//! - `logout` deletes the server-side session; the caller clears the cookie.
//!
//! Raw session and verification tokens only ever leave through the session
//! handle or the email transport. The store sees SHA-256 hashes.

pub mod accounts;
pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod service;
pub mod session;
pub mod users;
pub mod utils;
pub mod verification;

pub use accounts::AccountLinker;
pub use config::AuthConfig;
pub use error::AuthError;
pub use models::{Account, AuthMethod, User, UserRole};
pub use password::PasswordHasher;
pub use service::{AuthService, Registered};
pub use session::{SessionHandle, SessionManager};
pub use users::{CreateUser, UserDirectory};
pub use verification::VerificationTokenIssuer;
