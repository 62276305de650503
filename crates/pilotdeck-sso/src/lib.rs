//! # pilotdeck-sso
//!
//! SSO token handling for `PilotDeck`.
//!
//! The interactive login (browser redirect, code exchange) happens elsewhere
//! and hands over a [`Token`]. This crate keeps that token usable:
//!
//! - **Token model**: expiry, granted scopes, refresh token
//! - **Refresh**: `refresh_token` grant against the SSO token endpoint
//! - **Provider configuration**: EVE Online SSO and custom endpoints
//!
//! ## Token Refresh
//!
//! ```ignore
//! use pilotdeck_sso::{SsoClient, SsoProvider};
//!
//! let client = SsoClient::new("your_client_id", SsoProvider::eve_online()?);
//! if token.needs_refresh_at(chrono::Utc::now()) {
//!     let new_token = client.refresh_token(&token).await?;
//!     // Persist new_token
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod token;

pub use error::{Error, Result};
pub use flow::SsoClient;
pub use provider::SsoProvider;
pub use token::{EXPIRY_GUARD, Token};
