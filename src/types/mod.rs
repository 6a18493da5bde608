//! Core OAuth 2.0 protocol strings.
//!
//! Each type is validated against the grammar given in
//! [RFC 6749](https://datatracker.ietf.org/doc/html/rfc6749) and comes in a
//! borrowed/owned pair (e.g. [`AccessToken`] / [`AccessTokenBuf`]) following
//! the same pattern as [`str`] / [`String`].
mod access_token;
mod client_id;
mod redirect;
mod scope;

pub use access_token::*;
pub use client_id::*;
pub use redirect::*;
pub use scope::*;

/// Returns `true` if the byte is a VSCHAR (visible ASCII character plus
/// space), i.e. in the range `0x20..=0x7E`.
const fn is_vschar(c: u8) -> bool {
	c >= 0x20 && c <= 0x7e
}

/// Returns `true` if the byte is a NQCHAR (VSCHAR without `"` and `\` and
/// space).
const fn is_nqchar(c: u8) -> bool {
	c == 0x21 || (c >= 0x23 && c <= 0x5b) || (c >= 0x5d && c <= 0x7e)
}

/// Returns `true` if every byte is a VSCHAR. Accepts the empty string.
const fn all_vschars(bytes: &[u8]) -> bool {
	let mut i = 0;

	while i < bytes.len() {
		if !is_vschar(bytes[i]) {
			return false;
		}

		i += 1
	}

	true
}

/// `1*VSCHAR`.
const fn validate_vschars(bytes: &[u8]) -> bool {
	!bytes.is_empty() && all_vschars(bytes)
}
