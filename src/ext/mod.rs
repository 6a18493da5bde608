//! Protocol extensions used by native clients.
//!
//! - [`pkce`]: Proof Key for Code Exchange, on by default
//!   ([RFC 7636](https://datatracker.ietf.org/doc/html/rfc7636)).
pub mod pkce;
