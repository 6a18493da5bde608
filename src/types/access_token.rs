use http::HeaderValue;
use str_newtype::StrNewType;

use crate::error::Error;

use super::validate_vschars;

/// Access Token (borrowed).
///
/// # Grammar
///
/// ```abnf
/// access-token = 1*VSCHAR
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(
	serde,
	owned(AccessTokenBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash))
)]
pub struct AccessToken(str);

impl AccessToken {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		validate_vschars(bytes)
	}

	/// Builds the `Authorization: Bearer <token>` header value.
	///
	/// The value is marked sensitive so it never shows up in debug output.
	pub fn bearer_header(&self) -> Result<HeaderValue, Error> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.as_str()))
			.map_err(|_| Error::invalid_state("access token is not a valid header value"))?;
		value.set_sensitive(true);
		Ok(value)
	}
}
