use str_newtype::StrNewType;

use super::all_vschars;

/// Identifier under which the application is registered with the identity
/// service.
///
/// An empty identifier parses, so that a configuration file with a blank
/// entry loads; it is rejected as missing configuration when a flow starts.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-2.2>
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(
	serde,
	owned(ClientIdBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash))
)]
pub struct ClientId(str);

impl ClientId {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	/// `*VSCHAR`
	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		all_vschars(bytes)
	}
}
