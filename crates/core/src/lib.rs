//! Shared building blocks for the hotpot rental back-office clients.
//!
//! - [`session`]: the logged-in [`Session`](session::Session) and the
//!   [`SessionHandle`](session::SessionHandle) every other crate reads
//!   tokens from.
//! - [`store`]: persisted session storage (`userInfor` key-value file).
//! - [`claims`]: access-token claim decoding.
//! - [`config`]: environment-driven client configuration.

pub mod claims;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod types;
