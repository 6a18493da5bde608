use str_newtype::StrNewType;

use super::is_nqchar;

/// Space-separated scope tokens asked for in the authorization request, or
/// granted in the token response.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-3.3>
///
/// # Grammar
///
/// ```abnf
/// scope       = scope-token *( SP scope-token )
/// scope-token = 1*NQCHAR
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(serde, owned(ScopeBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash)))]
pub struct Scope(str);

impl Scope {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	/// Single spaces between tokens, none leading or trailing.
	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		let mut i = 0;
		let mut after_space = true;

		while i < bytes.len() {
			match bytes[i] {
				b' ' if after_space => return false,
				b' ' => after_space = true,
				c if is_nqchar(c) => after_space = false,
				_ => return false,
			}

			i += 1
		}

		!after_space
	}

	pub fn tokens(&self) -> impl Iterator<Item = &str> {
		self.as_str().split(' ')
	}

	pub fn contains(&self, token: &str) -> bool {
		self.tokens().any(|t| t == token)
	}

	/// `true` when the `openid` token is present, in which case the server
	/// returns an ID token.
	pub fn is_openid(&self) -> bool {
		self.contains("openid")
	}
}
