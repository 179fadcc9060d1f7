//! Cloud provider client interface.
//!
//! Everything the fleet engine knows about the provider goes through the
//! [`CloudProvider`] trait. There are two implementations:
//!
//! - [`HttpProvider`]: talks JSON over HTTP to a provider gateway.
//! - [`FixtureProvider`]: replays recorded request/response pairs and fails
//!   any call whose parameters differ from the recording.
//!
//! ## Modules
//!
//! - `model`: wire types (PascalCase on the wire)
//! - `request`: one request/response variant per provider operation
//! - `client`: the `CloudProvider` trait and typed helpers
//! - `http`: live client
//! - `fixture`: recorded client for tests

pub mod client;
pub mod error;
pub mod fixture;
pub mod http;
pub mod model;
pub mod request;

pub use client::CloudProvider;
pub use error::{ProviderError, ProviderResult};
pub use fixture::{FixtureProvider, RequestMatcher};
pub use http::HttpProvider;
pub use request::{Operation, ProviderRequest, ProviderResponse};
