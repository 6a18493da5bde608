//! Proof Key for Code Exchange.
//!
//! The client keeps a random verifier for the duration of one authorization
//! attempt, sends its SHA-256 challenge with the authorization request and
//! the verifier itself with the token request.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc7636>
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{RngExt, rng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use str_newtype::StrNewType;

/// CSPRNG bytes behind a generated verifier (43 characters once encoded).
pub const VERIFIER_ENTROPY: usize = 32;

/// Fresh code verifier for one authorization attempt.
pub fn generate_verifier() -> PkceCodeVerifierBuf {
	let bytes: [u8; VERIFIER_ENTROPY] = rng().random();
	unsafe {
		// SAFETY: 32 bytes encode to 43 base64url characters, all unreserved.
		PkceCodeVerifierBuf::new_unchecked(BASE64_URL_SAFE_NO_PAD.encode(bytes))
	}
}

/// `BASE64URL(SHA256(verifier))`.
pub fn compute_challenge(verifier: &PkceCodeVerifier) -> PkceCodeChallengeBuf {
	let digest = Sha256::digest(verifier.as_str().as_bytes());
	unsafe {
		// SAFETY: a SHA-256 digest encodes to 43 base64url characters.
		PkceCodeChallengeBuf::new_unchecked(BASE64_URL_SAFE_NO_PAD.encode(digest))
	}
}

/// `code_challenge_method` sent by this client.
///
/// `plain` is never offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PkceCodeChallengeMethod {
	#[default]
	S256,
}

impl PkceCodeChallengeMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::S256 => "S256",
		}
	}
}

/// Code verifier.
///
/// Secret kept by the client between the authorization request and the
/// token request. Never logged.
///
/// # Grammar
///
/// ```abnf
/// code-verifier = 43*128unreserved
/// unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(
	serde,
	owned(PkceCodeVerifierBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash))
)]
pub struct PkceCodeVerifier(str);

impl PkceCodeVerifier {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		is_unreserved_43_128(bytes)
	}
}

/// Code challenge, same grammar as the verifier.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(
	serde,
	owned(PkceCodeChallengeBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash))
)]
pub struct PkceCodeChallenge(str);

impl PkceCodeChallenge {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		is_unreserved_43_128(bytes)
	}
}

const fn is_unreserved_43_128(bytes: &[u8]) -> bool {
	if bytes.len() < 43 || bytes.len() > 128 {
		return false;
	}

	let mut i = 0;

	while i < bytes.len() {
		match bytes[i] {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => i += 1,
			_ => return false,
		}
	}

	true
}
