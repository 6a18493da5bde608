//! OAuth 2.0 / OpenID Connect authorization code client for desktop
//! applications, with entitlement decision support.
//!
//! The client follows [RFC 6749][rfc6749] with [PKCE][rfc7636] and the
//! recommendations of [RFC 8252][rfc8252] for native applications:
//!
//! - the authorization URI is shown in a user agent picked by a
//!   [`capture`] strategy (system browser with a loopback listener, embedded
//!   browser window, or a host-provided delegate);
//! - the redirect is parsed and the code exchanged for tokens at the token
//!   endpoint;
//! - ID tokens are verified against the configured signing key.
//!
//! The [`entitlement`] client then asks the decision endpoint whether
//! licensed items are authorized for the signed-in user.
//!
//! # Modules
//!
//! - [`config`]: client configuration.
//! - [`flow`]: the authorization state machine.
//! - [`capture`]: redirect capture strategies.
//! - [`endpoints`]: authorization URI, token and user info requests.
//! - [`token`]: token responses, ID tokens and signed token verification.
//! - [`entitlement`]: decision endpoint client.
//! - [`ext`]: protocol extensions (PKCE).
//! - [`server`]: OAuth error payloads.
//! - [`transport`]: HTTP transport layer and content type encoding.
//! - [`util`]: URI query string utilities.
//!
//! Core OAuth 2.0 types ([`AccessToken`], [`ClientId`], [`Code`], [`Scope`],
//! [`State`], etc.) are re-exported at the crate root.
//!
//! [rfc6749]: https://datatracker.ietf.org/doc/html/rfc6749
//! [rfc7636]: https://datatracker.ietf.org/doc/html/rfc7636
//! [rfc8252]: https://datatracker.ietf.org/doc/html/rfc8252
#[cfg(feature = "reqwest")]
pub use reqwest;

pub use http;
pub use tokio_util::sync::CancellationToken;

pub mod capture;
pub mod config;
pub mod endpoints;
pub mod entitlement;
pub mod error;
pub mod ext;
pub mod flow;
pub mod server;
pub mod token;
pub mod transport;
mod types;
pub mod util;

pub use error::{Error, Result};
pub use types::*;
