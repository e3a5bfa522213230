//! Authenticated REST client for the hotpot rental backend.
//!
//! [`ApiClient`] attaches the bearer token from the shared
//! [`SessionHandle`](hotpot_core::session::SessionHandle) to every request,
//! unwraps the backend's response envelope, and renews the access token once
//! when a request is rejected with 401 (see [`refresh`]).

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod hooks;
pub mod refresh;
pub mod request;
pub mod shipments;

pub use client::ApiClient;
pub use error::ApiError;
pub use hooks::{LoggingHooks, ResponseHooks};
pub use request::{FormPart, PendingRequest, RequestBody};
