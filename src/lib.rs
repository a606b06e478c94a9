//! # Authgate
//!
//! `authgate` establishes a verified user identity, binds it to a server-side
//! session, and keeps unverified accounts out until they confirm their email.
//!
//! ## Identities
//!
//! - **Credentials:** email plus an Argon2id-hashed password. New accounts start
//!   unverified and receive a single-use confirmation link; login is refused
//!   (and the link re-sent) until the link is used.
//! - **OAuth providers:** Google and Yandex via the authorization-code flow.
//!   Provider identities are trusted as verified and linked by
//!   `(provider, external id)`. Users are never merged by email.
//!
//! ## Sessions
//!
//! Sessions are opaque 32-byte tokens carried in an `HttpOnly` cookie (or an
//! `Authorization: Bearer` header). Only their SHA-256 hash is stored, and every
//! login issues a new token.

pub mod api;
pub mod auth;
pub mod cli;
pub mod email;
pub mod oauth;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
