//! Values carried through the authorization redirect.
//!
//! `state` and `nonce` are generated per attempt and sent with the
//! authorization request; the server sends `state` back with the `code`.
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{RngExt, rng};
use str_newtype::StrNewType;

use super::validate_vschars;

/// 128 bits.
const RANDOM_BYTES: usize = 16;

fn random_value() -> String {
	let bytes: [u8; RANDOM_BYTES] = rng().random();
	BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Opaque `state` value correlating a redirect with the request that caused
/// it.
///
/// The client compares the returned value byte for byte with the one it
/// sent; any visible character survives the round trip through the query
/// string.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-10.12>
///
/// # Grammar
///
/// ```abnf
/// state = 1*VSCHAR
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(serde, owned(StateBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash)))]
pub struct State(str);

impl State {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		validate_vschars(bytes)
	}
}

impl StateBuf {
	/// Fresh CSPRNG value, base64url without padding.
	pub fn new_random() -> Self {
		unsafe {
			// SAFETY: base64url output is a non-empty VSCHAR string.
			Self::new_unchecked(random_value())
		}
	}
}

/// OpenID Connect `nonce`, echoed inside the ID token.
///
/// See: <https://openid.net/specs/openid-connect-core-1_0.html#AuthRequest>
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(serde, owned(NonceBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash)))]
pub struct Nonce(str);

impl Nonce {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		validate_vschars(bytes)
	}
}

impl NonceBuf {
	pub fn new_random() -> Self {
		unsafe {
			// SAFETY: base64url output is a non-empty VSCHAR string.
			Self::new_unchecked(random_value())
		}
	}
}

/// Authorization code returned with the redirect.
///
/// Single use: the flow exchanges it once and drops it.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2>
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(serde, owned(CodeBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash)))]
pub struct Code(str);

impl Code {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		validate_vschars(bytes)
	}
}
