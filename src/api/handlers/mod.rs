pub mod auth;
pub mod error;
pub mod health;
pub mod oauth;
pub mod principal;
pub mod session;
pub mod types;
pub mod users;
pub mod verification;
