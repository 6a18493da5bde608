//! Compact signed tokens: ID tokens, token endpoint responses and their
//! claims.
mod claims;
mod jwt;
mod response;

pub use claims::{ClaimMap, parse_bool};
pub use jwt::{DecodedToken, TokenVerifier, decode_unverified};
pub use response::{AccessTokenResponse, IdToken};

#[cfg(test)]
pub(crate) use jwt::tests as test_tokens;
